//! Crate-level error type.
//!
//! Compile failures carry the full [`ErrorTrace`]; everything else is a
//! single well-placed variant. Runtime generation failures are deliberately
//! *not* represented here — the VM reports those as `None` from `next()`,
//! a recoverable condition the caller is expected to retry, not a `Result`.

use thiserror::Error;

use crate::error_trace::ErrorTrace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("pattern failed to compile:\n{0}")]
    Compile(ErrorTrace),

    #[error("pattern source is {len} bytes, exceeding the {max} byte limit")]
    PatternTooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
