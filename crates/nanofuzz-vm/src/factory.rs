//! The immutable, shareable compiled program a pattern links into.

use std::sync::{Arc, OnceLock};

use nanofuzz_lang::Block;

/// A named peer factory, attached under the declaring `<$NAME>`'s label.
#[derive(Debug)]
pub struct SubFactory {
    pub name: String,
    pub hash: u32,
    pub factory: Arc<Factory>,
}

/// The compiled, immutable instruction sequence plus its attached named
/// sub-factories.
///
/// Every sub-factory (and the top-level factory itself) shares the same
/// underlying `sub_factories` cell, so a sub-factory's own body can resolve
/// a reference to another name declared earlier in the same pattern — the
/// "replicate the name map into every sub-factory recursively" requirement.
/// The cell is written exactly once, by the linker, before any factory in
/// the group is handed to a caller.
#[derive(Debug)]
pub struct Factory {
    pub blocks: Box<[Block]>,
    pub max_nesting_used: usize,
    pub max_output_size: u64,
    pub(crate) sub_factories: Arc<OnceLock<Vec<SubFactory>>>,
}

impl Factory {
    pub fn sub_factories(&self) -> &[SubFactory] {
        self.sub_factories.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_sub_factory(&self, name: &str, hash: u32) -> Option<&Arc<Factory>> {
        self.sub_factories().iter().find(|s| s.hash == hash && s.name == name).map(|s| &s.factory)
    }
}
