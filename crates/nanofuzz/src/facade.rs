//! The public façade (C7): `open`/`next`/`free_output`/`close`/`explain`.

use std::sync::Arc;

use nanofuzz_core::limits::BUFFER_TIER_NORMAL;
use nanofuzz_core::prng::Prng;
use nanofuzz_vm::{Factory, Generator, Output};

use crate::error::{Error, Result};
use crate::prefetch::{PrefetchMode, PrefetchWorker};

/// Per-call generator buffer size, chosen independently of a factory's
/// `max_output_size`: a pattern whose outputs can exceed the chosen tier
/// will legitimately see [`Context::next`] return `Ok(None)` on the larger
/// draws, per the overflow contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTier {
    Tiny,
    Small,
    Normal,
    Large,
    Extreme,
}

impl BufferTier {
    pub fn bytes(self) -> u64 {
        use nanofuzz_core::limits::{BUFFER_TIER_EXTREME, BUFFER_TIER_LARGE, BUFFER_TIER_SMALL, BUFFER_TIER_TINY};
        match self {
            BufferTier::Tiny => BUFFER_TIER_TINY,
            BufferTier::Small => BUFFER_TIER_SMALL,
            BufferTier::Normal => BUFFER_TIER_NORMAL,
            BufferTier::Large => BUFFER_TIER_LARGE,
            BufferTier::Extreme => BUFFER_TIER_EXTREME,
        }
    }
}

impl Default for BufferTier {
    fn default() -> Self {
        BufferTier::Normal
    }
}

/// Options controlling how a [`Context`] is opened: buffer sizing, seed, and
/// the optional prefetch worker.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub seed: u64,
    pub buffer_tier: BufferTier,
    pub prefetch_size: usize,
    pub prefetch_mode: Option<PrefetchMode>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            seed: nanofuzz_core::random_seed(),
            buffer_tier: BufferTier::default(),
            prefetch_size: 0,
            prefetch_mode: None,
        }
    }
}

/// A compiled pattern plus the mutable state needed to draw outputs from
/// it: a generator, its PRNG, and an optional background prefetch worker.
pub struct Context {
    factory: Arc<Factory>,
    generator: Generator,
    prng: Prng,
    prefetch: Option<PrefetchWorker>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

/// Compile `pattern` and open a context ready to generate from it.
#[tracing::instrument(skip(pattern), fields(pattern_len = pattern.len()))]
pub fn open(pattern: &str, options: OpenOptions) -> Result<Context> {
    if pattern.len() > nanofuzz_core::limits::MAX_PATTERN_LEN {
        tracing::warn!(len = pattern.len(), max = nanofuzz_core::limits::MAX_PATTERN_LEN, "pattern source too long");
        return Err(Error::Core(nanofuzz_core::Error::PatternTooLong {
            len: pattern.len(),
            max: nanofuzz_core::limits::MAX_PATTERN_LEN,
        }));
    }

    let parsed = match nanofuzz_lang::parse(pattern) {
        Ok(parsed) => parsed,
        Err(trace) => {
            tracing::warn!(fragments = trace.len(), first = %trace.fragments().first().map(ToString::to_string).unwrap_or_default(), "pattern failed to compile");
            return Err(Error::Core(nanofuzz_core::Error::Compile(trace)));
        }
    };

    let factory = match nanofuzz_vm::link(parsed) {
        Ok(factory) => factory,
        Err(trace) => {
            tracing::warn!(fragments = trace.len(), "pattern failed to link");
            return Err(Error::Core(nanofuzz_core::Error::Compile(trace)));
        }
    };

    tracing::debug!(
        blocks = factory.blocks.len(),
        max_output_size = factory.max_output_size,
        sub_factories = factory.sub_factories().len(),
        "pattern compiled"
    );

    let buffer_capacity = options.buffer_tier.bytes();
    let generator = Generator::new(factory.clone(), buffer_capacity);
    let prng = Prng::new(options.seed);

    let prefetch = options.prefetch_mode.map(|mode| {
        PrefetchWorker::spawn(factory.clone(), buffer_capacity, Prng::new(options.seed), options.prefetch_size, mode)
    });

    Ok(Context { factory, generator, prng, prefetch })
}

impl Context {
    /// Produce one output, either from the prefetch buffer (if enabled) or
    /// by running the generator directly.
    ///
    /// `Ok(None)` is a successful call that produced no output because the
    /// draw would have overflowed the generator's buffer tier; the caller
    /// may retry.
    pub fn next(&mut self) -> Result<Option<Output>> {
        if let Some(prefetch) = &self.prefetch {
            return Ok(prefetch.pop());
        }
        Ok(self.generator.generate(&mut self.prng))
    }

    /// Release a previously produced output. Each `Output` here owns an
    /// independent copy of its bytes (never an alias of a sub-generator's
    /// cached most-recent output), so dropping it is the entire contract;
    /// this exists to mirror the façade's documented lifecycle explicitly.
    pub fn free_output(&mut self, output: Output) {
        drop(output);
    }

    /// Write a step-by-step description of the compiled factory.
    pub fn explain(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        nanofuzz_vm::explain::explain(out, &self.factory)
    }

    pub fn max_output_size(&self) -> u64 {
        self.factory.max_output_size
    }

    /// Tear down the context, stopping the prefetch worker if one is
    /// running.
    pub fn close(mut self) -> Result<()> {
        if let Some(prefetch) = self.prefetch.take() {
            prefetch.stop()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_generate_literal_pattern() {
        let mut ctx = open("hello", OpenOptions { seed: 1, ..Default::default() }).unwrap();
        let out = ctx.next().unwrap().unwrap();
        assert_eq!(out.as_bytes(), b"hello");
        ctx.close().unwrap();
    }

    #[test]
    fn open_rejects_invalid_pattern() {
        let err = open("a{5,3}", OpenOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Core(nanofuzz_core::Error::Compile(_))));
    }

    #[test]
    fn open_rejects_a_pattern_source_over_the_length_limit() {
        let huge = "a".repeat(nanofuzz_core::limits::MAX_PATTERN_LEN + 1);
        let err = open(&huge, OpenOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(nanofuzz_core::Error::PatternTooLong { len, max })
                if len == huge.len() && max == nanofuzz_core::limits::MAX_PATTERN_LEN
        ));
    }

    #[test]
    fn prefetch_oneshot_drains_then_empties() {
        let options = OpenOptions {
            seed: 0xDEAD_BEEF,
            prefetch_size: 4,
            prefetch_mode: Some(PrefetchMode::Oneshot),
            ..Default::default()
        };
        let mut ctx = open("abc", options).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let mut produced = 0;
        while let Some(out) = ctx.next().unwrap() {
            assert_eq!(out.as_bytes(), b"abc");
            produced += 1;
            if produced > 4 {
                break;
            }
        }
        assert_eq!(produced, 4);
        ctx.close().unwrap();
    }
}
