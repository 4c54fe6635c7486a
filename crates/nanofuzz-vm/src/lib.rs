//! Links a parsed pattern into a [`Factory`] and drives it through a
//! [`Generator`] to produce output, with an [`explain`] dump of a factory's
//! structure for diagnostics.

pub mod explain;
pub mod factory;
pub mod lenfmt;
pub mod linker;
pub mod reference_table;
pub mod vm;

pub use factory::{Factory, SubFactory};
pub use linker::link;
pub use vm::{Generator, Output};
