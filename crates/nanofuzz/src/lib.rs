//! Deterministic, pattern-based random byte sequence generation.
//!
//! ```no_run
//! use nanofuzz::{open, OpenOptions};
//!
//! let mut ctx = open("[A-Z]{4}", OpenOptions { seed: 42, ..Default::default() }).unwrap();
//! let output = ctx.next().unwrap().unwrap();
//! assert_eq!(output.len(), 4);
//! ctx.close().unwrap();
//! ```

pub mod error;
pub mod facade;
pub mod prefetch;

pub use error::{Error, Result};
pub use facade::{open, BufferTier, Context, OpenOptions};
pub use nanofuzz_vm::Output;
pub use prefetch::PrefetchMode;
