//! The generator VM (C5): walks a linked [`Factory`]'s instruction array,
//! drawing from a [`Prng`] to produce one output per [`Generator::generate`]
//! call.
//!
//! The instruction pointer is a plain `usize` index into the factory's flat
//! block array; `Sub`/`Ret` form the only looping construct and carry a
//! small stack of per-scope iteration counters, `BranchRoot`/`BranchJmp`
//! form the only branch, and every emitting block is guarded by a
//! checked-arithmetic capacity test against the generator's own buffer
//! before a single byte is written.

use std::sync::Arc;

use nanofuzz_core::prng::Prng;
use nanofuzz_lang::{Block, ReferenceKind};

use crate::factory::Factory;
use crate::lenfmt;
use crate::reference_table::ReferenceTable;

/// One generated value: a byte sequence plus its length (the two are the
/// same thing in this representation, but callers reference both since a
/// length of zero is a valid, distinct result from generation failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    bytes: Vec<u8>,
}

impl Output {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

struct NestFrame {
    how_many: u64,
    generated: u64,
    nullified: bool,
}

fn draw_iters(prng: &mut Prng, count: nanofuzz_lang::Repetition) -> u16 {
    if count.single {
        count.base
    } else {
        prng.bounded(count.base as u64, count.high as u64) as u16
    }
}

/// A generator context (C3 in spec terms): a factory plus the mutable
/// per-call state a run through it needs. One `Generator` exists per
/// referenced name (held inside that name's [`crate::reference_table::SubGeneratorCacheEntry`])
/// in addition to the top-level one the facade drives directly.
pub struct Generator {
    factory: Arc<Factory>,
    buffer_capacity: u64,
    refs: ReferenceTable,
}

impl Generator {
    pub fn new(factory: Arc<Factory>, buffer_capacity: u64) -> Self {
        let refs = ReferenceTable::new(&factory);
        Generator { factory, buffer_capacity, refs }
    }

    pub fn max_output_size(&self) -> u64 {
        self.factory.max_output_size
    }

    /// Run the factory's program once, returning the produced output or
    /// `None` if the buffer's capacity would have been exceeded.
    ///
    /// On `None`, every sub-generator's most-recent-output cache is reset,
    /// matching the "zero the buffer, clear the most-recent cache" recovery
    /// contract: a failed call leaves no partial state a later call could
    /// observe.
    pub fn generate(&mut self, prng: &mut Prng) -> Option<Output> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut nest_stack: Vec<NestFrame> = Vec::new();
        let mut pip: usize = 0;
        let blocks = &self.factory.blocks;

        loop {
            let nullified = nest_stack.iter().any(|f| f.nullified);
            let block = &blocks[pip];

            if nullified {
                match block {
                    Block::Sub { .. } => {
                        nest_stack.push(NestFrame { how_many: 0, generated: 0, nullified: true });
                        pip += 1;
                    }
                    Block::Ret { .. } => {
                        nest_stack.pop();
                        pip += 1;
                    }
                    _ => pip += 1,
                }
                continue;
            }

            match block {
                Block::End => break,

                Block::String { data, count } => {
                    let iters = draw_iters(prng, *count) as u64;
                    let need = iters.checked_mul(data.len() as u64);
                    if !self.reserve(&buffer, need) {
                        self.refs.reset();
                        return None;
                    }
                    for _ in 0..iters {
                        buffer.extend_from_slice(data);
                    }
                    pip += 1;
                }

                Block::Range { set, count } => {
                    let iters = draw_iters(prng, *count) as u64;
                    if !self.reserve(&buffer, Some(iters)) {
                        self.refs.reset();
                        return None;
                    }
                    for _ in 0..iters {
                        let idx = prng.bounded(0, set.ranges.len() as u64 - 1) as usize;
                        let range = set.ranges[idx];
                        buffer.push(prng.bounded_byte(range.lo, range.hi));
                    }
                    pip += 1;
                }

                Block::Sub { count, .. } => {
                    let iters = draw_iters(prng, *count) as u64;
                    nest_stack.push(NestFrame { how_many: iters, generated: 0, nullified: iters == 0 });
                    pip += 1;
                }

                Block::Ret { back_offset } => {
                    let frame = nest_stack.last_mut().expect("Ret without matching Sub on the nest stack");
                    frame.generated += 1;
                    if frame.generated < frame.how_many {
                        pip -= back_offset;
                    } else {
                        nest_stack.pop();
                        pip += 1;
                    }
                }

                Block::BranchRoot { steps } => {
                    let idx = prng.bounded(0, steps.len() as u64 - 1) as usize;
                    pip += steps[idx];
                }

                Block::BranchJmp { forward_offset } => {
                    pip += forward_offset;
                }

                Block::Reference { reference, count } => {
                    let entry = match self.refs.find_mut(&reference.name, reference.hash) {
                        Some(entry) => entry,
                        None => {
                            debug_assert!(false, "linker produced a reference with no matching sub-factory");
                            self.refs.reset();
                            return None;
                        }
                    };

                    match &reference.kind {
                        ReferenceKind::Paste => {
                            if entry.cached_output.is_none() {
                                let Some(generated) = entry.sub_generator.generate(prng) else {
                                    self.refs.reset();
                                    return None;
                                };
                                entry.cached_output = Some(generated);
                            }
                            let bytes = entry.cached_output.as_ref().unwrap().as_bytes().to_vec();
                            let iters = draw_iters(prng, *count) as u64;
                            let need = iters.checked_mul(bytes.len() as u64);
                            if !self.reserve(&buffer, need) {
                                self.refs.reset();
                                return None;
                            }
                            for _ in 0..iters {
                                buffer.extend_from_slice(&bytes);
                            }
                        }
                        ReferenceKind::Length(opts) => {
                            if entry.cached_output.is_none() {
                                let Some(generated) = entry.sub_generator.generate(prng) else {
                                    self.refs.reset();
                                    return None;
                                };
                                entry.cached_output = Some(generated);
                            }
                            let len = entry.cached_output.as_ref().unwrap().len();
                            let encoded = lenfmt::encode(len, *opts);
                            let iters = draw_iters(prng, *count) as u64;
                            let need = iters.checked_mul(encoded.len() as u64);
                            if !self.reserve(&buffer, need) {
                                self.refs.reset();
                                return None;
                            }
                            for _ in 0..iters {
                                buffer.extend_from_slice(&encoded);
                            }
                        }
                        ReferenceKind::Shuffle => {
                            let Some(regenerated) = entry.sub_generator.generate(prng) else {
                                self.refs.reset();
                                return None;
                            };
                            entry.cached_output = Some(regenerated);
                        }
                    }
                    pip += 1;
                }
            }
        }

        Some(Output { bytes: buffer })
    }

    /// Checked capacity test: `None` addend means the multiply itself
    /// already overflowed `u64`, which is always over capacity.
    fn reserve(&self, buffer: &[u8], add: Option<u64>) -> bool {
        match add.and_then(|add| (buffer.len() as u64).checked_add(add)) {
            Some(total) => total <= self.buffer_capacity,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::link;
    use nanofuzz_lang::parse;
    use proptest::prelude::*;

    fn generator_for(pattern: &str) -> Generator {
        let factory = link(parse(pattern).unwrap()).unwrap();
        let capacity = factory.max_output_size;
        Generator::new(factory, capacity)
    }

    #[test]
    fn literal_pattern_emits_itself() {
        let mut gen = generator_for("hello");
        let mut prng = Prng::new(1);
        let out = gen.generate(&mut prng).unwrap();
        assert_eq!(out.as_bytes(), b"hello");
    }

    #[test]
    fn exact_repetition_repeats_merged_literal() {
        let mut gen = generator_for("a{3}b{2}");
        let mut prng = Prng::new(1);
        let out = gen.generate(&mut prng).unwrap();
        assert_eq!(out.as_bytes(), b"aaabb");
    }

    #[test]
    fn zero_repetition_nullifies_subsequence() {
        let mut gen = generator_for("x(yz){0}w");
        let mut prng = Prng::new(1);
        let out = gen.generate(&mut prng).unwrap();
        assert_eq!(out.as_bytes(), b"xw");
    }

    #[test]
    fn declaration_paste_repeats_cached_output() {
        let mut gen = generator_for("(AB){3}<$X>-<@X><@X>");
        let mut prng = Prng::new(0xDEAD_BEEF);
        let out = gen.generate(&mut prng).unwrap();
        assert_eq!(out.as_bytes(), b"-ABABABABABAB");
    }

    #[test]
    fn length_reference_reports_pasted_size() {
        let mut gen = generator_for("<$L>([0-9]{3})-<#d4+0:L>:<@L>");
        let mut prng = Prng::new(7);
        let out = gen.generate(&mut prng).unwrap();
        let text = std::str::from_utf8(out.as_bytes()).unwrap();
        let mut pieces = text.splitn(3, |c| c == '-' || c == ':');
        let _ = pieces.next();
        let len_field = pieces.next().unwrap();
        let pasted = pieces.next().unwrap();
        assert_eq!(len_field, format!("{:04}", pasted.len()));
    }

    #[test]
    fn alternation_always_picks_one_declared_arm() {
        let mut gen = generator_for("ab|cd|ef");
        let mut prng = Prng::new(3);
        for _ in 0..20 {
            let out = gen.generate(&mut prng).unwrap();
            assert!(matches!(out.as_bytes(), b"ab" | b"cd" | b"ef"));
        }
    }

    #[test]
    fn overflow_returns_none_and_resets_cache() {
        let factory = link(parse("a{10}").unwrap()).unwrap();
        let mut gen = Generator::new(factory, 3);
        let mut prng = Prng::new(1);
        assert!(gen.generate(&mut prng).is_none());
    }

    proptest::proptest! {
        #[test]
        fn repetition_count_stays_within_its_declared_bounds(seed: u64, low in 1u16..20, extra in 0u16..20) {
            let high = low + extra;
            let pattern = format!("x{{{low},{high}}}");
            let mut gen = generator_for(&pattern);
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            let count = out.len() as u16;
            prop_assert!(count >= low && count <= high);
        }

        #[test]
        fn range_emits_only_bytes_inside_the_declared_set(seed: u64, reps in 1u16..30) {
            let pattern = format!("[A-Fa-f0-9]{{{reps}}}");
            let mut gen = generator_for(&pattern);
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            prop_assert!(out.as_bytes().iter().all(|b| b.is_ascii_hexdigit()));
        }

        #[test]
        fn negated_range_never_emits_the_excluded_bytes(seed: u64, reps in 1u16..30) {
            let pattern = format!("[^a-z]{{{reps}}}");
            let mut gen = generator_for(&pattern);
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            prop_assert!(out.as_bytes().iter().all(|b| !(b'a'..=b'z').contains(b)));
        }

        #[test]
        fn alternation_output_is_always_exactly_one_declared_arm(seed: u64) {
            let mut gen = generator_for("ab|cd|ef");
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            prop_assert!(matches!(out.as_bytes(), b"ab" | b"cd" | b"ef"));
        }

        #[test]
        fn zero_count_nullifies_regardless_of_inner_complexity(seed: u64) {
            let mut gen = generator_for("x([A-Z]{5}|[0-9]{5}){0}y");
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            prop_assert_eq!(out.as_bytes(), b"xy");
        }

        #[test]
        fn output_never_exceeds_the_factorys_declared_maximum(seed: u64) {
            let factory = link(parse("[A-Z]{0,8}(ab|cd){0,4}").unwrap()).unwrap();
            let max = factory.max_output_size;
            let mut gen = Generator::new(factory, max);
            let mut prng = Prng::new(seed);
            let out = gen.generate(&mut prng).unwrap();
            prop_assert!(out.len() as u64 <= max);
        }
    }
}
