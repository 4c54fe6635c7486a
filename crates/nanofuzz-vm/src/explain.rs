//! Step-by-step human-readable dump of a factory's compiled program, for
//! diagnostics rather than generation. Grounded on `PatternFactory__explain`'s
//! two-pass shape: every attached sub-factory first, then the parent's own
//! node sequence with a nest-depth gutter.

use std::io::{self, Write};

use nanofuzz_lang::{Block, ReferenceKind};

use crate::factory::Factory;

fn range_text(count: nanofuzz_lang::Repetition) -> String {
    if count.single {
        format!("{}", count.base)
    } else {
        format!("{} to {}", count.base, count.high)
    }
}

/// Write a human-readable explanation of `factory` to `out`.
pub fn explain(out: &mut impl Write, factory: &Factory) -> io::Result<()> {
    if !factory.sub_factories().is_empty() {
        writeln!(out, "@=@=@=@ Factory contains {} associated sub-factories. @=@=@=@", factory.sub_factories().len())?;
        for sub in factory.sub_factories() {
            writeln!(out, "\n===> Sub-factory '{}':", sub.name)?;
            explain(out, &sub.factory)?;
        }
        writeln!(out, "\n\n********** Parent factory **********")?;
    }

    let mut nest = 0usize;
    for (idx, block) in factory.blocks.iter().enumerate() {
        write!(out, "[step {:5}] ", idx + 1)?;
        for _ in 0..nest {
            write!(out, ">")?;
        }
        write!(out, " ")?;

        match block {
            Block::String { data, count } => {
                let text = String::from_utf8_lossy(data);
                writeln!(out, "output static string '{}' ({} times)", text, range_text(*count))?;
            }
            Block::Range { set, count } => {
                let ranges: Vec<String> = set.ranges.iter().map(|r| format!("{} to {}", r.lo, r.hi)).collect();
                writeln!(out, "output a byte from [{}] ({} times)", ranges.join(", "), range_text(*count))?;
            }
            Block::Sub { count, nest_id } => {
                writeln!(out, "enter subsequence layer (nest tag {}), runs {} times", nest_id, range_text(*count))?;
                nest += 1;
            }
            Block::Ret { back_offset } => {
                writeln!(out, "repeat subsequence layer as applicable, goes {} steps back", back_offset)?;
                nest = nest.saturating_sub(1);
            }
            Block::BranchRoot { steps } => {
                let text: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                writeln!(out, "[branch] leap forward one of [{}] steps", text.join(", "))?;
            }
            Block::BranchJmp { forward_offset } => {
                writeln!(out, "[branch-end] jump {} steps ahead to exit branch", forward_offset)?;
            }
            Block::Reference { reference, count } => {
                let verb = match &reference.kind {
                    ReferenceKind::Paste => "paste pre-generated".to_string(),
                    ReferenceKind::Shuffle => "regenerate".to_string(),
                    ReferenceKind::Length(opts) => {
                        format!("output the length ({:?}, width {}, add {}) of the", opts.format, opts.width, opts.add)
                    }
                };
                writeln!(out, "{} stored subsequence '{}' ({} times)", verb, reference.name, range_text(*count))?;
            }
            Block::End => {
                writeln!(out, "stream end block (termination)")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::link;
    use nanofuzz_lang::parse;

    #[test]
    fn explain_does_not_fail_on_a_representative_pattern() {
        let factory = link(parse("(AB){3}<$X>-<@X><@X>").unwrap()).unwrap();
        let mut buf = Vec::new();
        explain(&mut buf, &factory).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Sub-factory 'X'"));
        assert!(text.contains("stream end block"));
    }
}
