use clap::Parser;

#[derive(Parser)]
#[command(name = "nanofuzz")]
#[command(about = "Generate random byte sequences from a pattern", long_about = None)]
#[command(version)]
#[command(group(
    clap::ArgGroup::new("source")
        .args(["interactive", "pattern", "file"])
        .required(true)
        .multiple(false)
))]
pub struct Cli {
    /// Read the pattern from a line of stdin
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Pattern given directly as an argument
    #[arg(short = 'p', long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Read the pattern from a file
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<std::path::PathBuf>,

    /// Number of outputs to generate
    #[arg(short = 'l', long, default_value = "1")]
    pub count: u64,

    /// Strip literal CR/LF bytes from the loaded pattern source
    #[arg(short = 'n', long)]
    pub strip_newlines: bool,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enable verbose tracing output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_source_is_required() {
        assert!(Cli::try_parse_from(["nanofuzz"]).is_err());
        assert!(Cli::try_parse_from(["nanofuzz", "-p", "abc"]).is_ok());
        assert!(Cli::try_parse_from(["nanofuzz", "-p", "abc", "-i"]).is_err());
    }

    #[test]
    fn defaults_to_one_output() {
        let cli = Cli::try_parse_from(["nanofuzz", "-p", "abc"]).unwrap();
        assert_eq!(cli.count, 1);
        assert!(!cli.strip_newlines);
    }
}
