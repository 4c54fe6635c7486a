mod cli;

use std::io::{self, Read, Write};

use clap::Parser;
use cli::Cli;
use nanofuzz::{open, OpenOptions};

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")))
            .try_init();
    }

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut pattern = load_pattern(cli)?;
    if cli.strip_newlines {
        pattern.retain(|c| c != '\r' && c != '\n');
    }

    let seed = cli.seed.unwrap_or_else(nanofuzz_core::random_seed);
    let options = OpenOptions { seed, ..Default::default() };

    let mut ctx = open(&pattern, options).map_err(|err| match err {
        nanofuzz::Error::Core(nanofuzz_core::Error::Compile(trace)) => {
            trace.fragments().iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
        }
        other => other.to_string(),
    })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for _ in 0..cli.count {
        match ctx.next().map_err(|err| err.to_string())? {
            Some(output) => {
                out.write_all(output.as_bytes()).map_err(|err| err.to_string())?;
                out.write_all(b"\n").map_err(|err| err.to_string())?;
            }
            None => {
                eprintln!("generation overflowed the buffer for this draw, skipping");
            }
        }
    }

    ctx.close().map_err(|err| err.to_string())?;
    Ok(())
}

fn load_pattern(cli: &Cli) -> Result<String, String> {
    if cli.interactive {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map_err(|err| err.to_string())?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    if let Some(pattern) = &cli.pattern {
        return Ok(pattern.clone());
    }

    if let Some(path) = &cli.file {
        let mut contents = String::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|err| format!("failed to read pattern file: {err}"))?;
        return Ok(contents);
    }

    unreachable!("clap's ArgGroup guarantees exactly one source is set")
}
