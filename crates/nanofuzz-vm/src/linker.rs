//! The factory linker (C4): turns the parser's unlinked block list into an
//! immutable, jump-resolved [`Factory`].
//!
//! Compiles each declaration's body into a single contiguous array
//! terminated by `End`, then computes an output-size upper bound with a
//! linear walk over a nesting multiplier stack.

use std::sync::{Arc, OnceLock};

use nanofuzz_core::error_trace::{ErrorCode, ErrorFragment, ErrorTrace};
use nanofuzz_core::limits::{MAX_OUTPUT_SIZE, MAX_SUB_FACTORIES};
use nanofuzz_lang::{Block, ParsedPattern, ReferenceKind};

use crate::factory::{Factory, SubFactory};
use crate::lenfmt;

fn fail(code: ErrorCode, msg: impl Into<String>) -> ErrorTrace {
    let mut trace = ErrorTrace::new();
    trace.push(ErrorFragment::new(code, 0, 0, msg));
    trace
}

/// Links a fully parsed pattern into a shareable [`Factory`], compiling
/// each `<$NAME>` declaration into its own peer sub-factory first so later
/// declarations (and the top-level program) can resolve references to
/// earlier names.
pub fn link(parsed: ParsedPattern) -> Result<Arc<Factory>, ErrorTrace> {
    if parsed.declarations.len() > MAX_SUB_FACTORIES {
        return Err(fail(ErrorCode::TooMuchNesting, "too many sub-factory declarations"));
    }

    let shared: Arc<OnceLock<Vec<SubFactory>>> = Arc::new(OnceLock::new());
    let mut subs: Vec<SubFactory> = Vec::new();

    for decl in parsed.declarations {
        validate(&decl.body)?;
        let max_output_size = compute_max_output_size(&decl.body, &subs)?;
        let max_nesting_used = max_nesting(&decl.body);
        let mut blocks: Vec<Block> = decl.body;
        blocks.push(Block::End);
        let factory = Factory {
            blocks: blocks.into_boxed_slice(),
            max_nesting_used,
            max_output_size,
            sub_factories: shared.clone(),
        };
        subs.push(SubFactory { name: decl.name, hash: decl.hash, factory: Arc::new(factory) });
    }

    validate(&parsed.blocks)?;
    let max_output_size = compute_max_output_size(&parsed.blocks, &subs)?;
    let max_nesting_used = max_nesting(&parsed.blocks);
    let mut blocks = parsed.blocks;
    blocks.push(Block::End);

    // Infallible: `shared` has not been written to by anyone else.
    let _ = shared.set(subs);

    let top = Factory { blocks: blocks.into_boxed_slice(), max_nesting_used, max_output_size, sub_factories: shared };
    Ok(Arc::new(top))
}

/// Structural sanity pass: `Sub`/`Ret` balance, `BranchJmp` offsets
/// non-zero, `BranchRoot` tables non-degenerate. The parser builds blocks
/// that already satisfy these by construction; this is the linker's own
/// gate per its stated responsibilities, independent of how the blocks
/// were produced.
fn validate(blocks: &[Block]) -> Result<(), ErrorTrace> {
    let mut sub_stack: Vec<usize> = Vec::new();
    for (idx, block) in blocks.iter().enumerate() {
        match block {
            Block::Sub { .. } => sub_stack.push(idx),
            Block::Ret { back_offset } => {
                let sub_idx = sub_stack
                    .pop()
                    .ok_or_else(|| fail(ErrorCode::InvalidSyntax, "unmatched Ret block"))?;
                if idx.checked_sub(*back_offset) != Some(sub_idx + 1) {
                    return Err(fail(ErrorCode::InvalidSyntax, "Ret back_offset does not match its Sub"));
                }
            }
            Block::BranchJmp { forward_offset } => {
                if *forward_offset == 0 {
                    return Err(fail(ErrorCode::InvalidSyntax, "BranchJmp was never back-filled"));
                }
            }
            Block::BranchRoot { steps } => {
                if steps.len() < 2 || steps.iter().any(|s| *s == 0) {
                    return Err(fail(ErrorCode::InvalidSyntax, "malformed BranchRoot step table"));
                }
            }
            _ => {}
        }
    }
    if !sub_stack.is_empty() {
        return Err(fail(ErrorCode::InvalidSyntax, "unmatched Sub block"));
    }
    Ok(())
}

fn max_nesting(blocks: &[Block]) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for block in blocks {
        match block {
            Block::Sub { .. } => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            Block::Ret { .. } => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

fn find_sub<'a>(subs: &'a [SubFactory], name: &str, hash: u32) -> Option<&'a SubFactory> {
    subs.iter().find(|s| s.hash == hash && s.name == name)
}

/// Upper bound on bytes a single execution of `blocks` can produce,
/// walking linearly with a nesting-multiplier stack. Every arm of every
/// alternation is counted (not just the one chosen at runtime), since this
/// is a static upper bound, not a simulation.
fn compute_max_output_size(blocks: &[Block], known_subs: &[SubFactory]) -> Result<u64, ErrorTrace> {
    let mut total: u64 = 0;
    let mut multipliers: Vec<u64> = vec![1];

    let overflow = || fail(ErrorCode::TooMuchNesting, "factory's maximum output size exceeds the hard cap");

    for block in blocks {
        match block {
            Block::Sub { count, .. } => {
                let current = *multipliers.last().unwrap();
                let next = current.checked_mul(count.high() as u64).ok_or_else(overflow)?;
                multipliers.push(next);
            }
            Block::Ret { .. } => {
                multipliers.pop();
                if multipliers.is_empty() {
                    multipliers.push(1);
                }
            }
            Block::String { data, count } => {
                let current = *multipliers.last().unwrap();
                let add = current
                    .checked_mul(count.high() as u64)
                    .and_then(|m| m.checked_mul(data.len() as u64))
                    .ok_or_else(overflow)?;
                total = total.checked_add(add).ok_or_else(overflow)?;
            }
            Block::Range { count, .. } => {
                let current = *multipliers.last().unwrap();
                let add = current.checked_mul(count.high() as u64).ok_or_else(overflow)?;
                total = total.checked_add(add).ok_or_else(overflow)?;
            }
            Block::Reference { reference, count } => {
                let unit: u64 = match &reference.kind {
                    ReferenceKind::Paste => {
                        let sub = find_sub(known_subs, &reference.name, reference.hash)
                            .ok_or_else(|| fail(ErrorCode::InvalidSyntax, "reference to undeclared name"))?;
                        sub.factory.max_output_size
                    }
                    ReferenceKind::Length(opts) => lenfmt::max_encoded_len(*opts) as u64,
                    ReferenceKind::Shuffle => 0,
                };
                let current = *multipliers.last().unwrap();
                let add = current.checked_mul(count.high() as u64).and_then(|m| m.checked_mul(unit)).ok_or_else(overflow)?;
                total = total.checked_add(add).ok_or_else(overflow)?;
            }
            Block::BranchRoot { .. } | Block::BranchJmp { .. } | Block::End => {}
        }
        if total > MAX_OUTPUT_SIZE {
            return Err(overflow());
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanofuzz_lang::parse;

    fn link_pattern(pattern: &str) -> Arc<Factory> {
        link(parse(pattern).unwrap()).unwrap()
    }

    #[test]
    fn simple_literal_links() {
        let factory = link_pattern("aaaaa");
        assert_eq!(factory.max_output_size, 5);
        assert!(matches!(factory.blocks.last(), Some(Block::End)));
    }

    #[test]
    fn repetition_multiplies_into_max_output_size() {
        let factory = link_pattern("a{3}b{2}");
        assert_eq!(factory.max_output_size, 5);
    }

    #[test]
    fn nested_subsequence_multiplies_correctly() {
        let factory = link_pattern("(AB){3}<$X>-<@X><@X>");
        // top level: "-" (1) + two pastes of X's max (6 bytes each) = 13
        assert_eq!(factory.max_output_size, 1 + 6 + 6);
        assert_eq!(factory.sub_factories().len(), 1);
        assert_eq!(factory.sub_factories()[0].factory.max_output_size, 6);
    }

    #[test]
    fn output_too_large_is_rejected_at_compile_time() {
        use nanofuzz_lang::Repetition;

        let blocks = vec![
            Block::Sub { count: Repetition::exact(65535), nest_id: 0 },
            Block::Sub { count: Repetition::exact(65535), nest_id: 1 },
            Block::String { data: vec![b'a'], count: Repetition::exact(65535) },
            Block::Ret { back_offset: 1 },
            Block::Ret { back_offset: 3 },
        ];
        assert!(validate(&blocks).is_ok());
        assert!(compute_max_output_size(&blocks, &[]).is_err());
    }

    #[test]
    fn oversized_back_offset_is_a_compile_error_not_a_panic() {
        use nanofuzz_lang::Repetition;

        let blocks = vec![
            Block::Sub { count: Repetition::exact(1), nest_id: 0 },
            Block::String { data: vec![b'a'], count: Repetition::ONE },
            Block::Ret { back_offset: 999_999 },
        ];
        assert!(validate(&blocks).is_err());
    }
}
