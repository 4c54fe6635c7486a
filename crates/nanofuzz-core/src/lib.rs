//! Primitives shared by the nanofuzz pattern language and generator VM:
//! the deterministic PRNG, compile-time diagnostics, the crate-level error
//! type, and the configuration limits every other crate compiles against.

pub mod error;
pub mod error_trace;
pub mod label;
pub mod limits;
pub mod prng;

pub use error::{Error, Result};
pub use error_trace::{ErrorCode, ErrorFragment, ErrorTrace};
pub use label::{djb2, is_valid_label};
pub use prng::{random_seed, Prng};
