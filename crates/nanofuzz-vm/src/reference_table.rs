//! The reference table (C6): one cache entry per declared name, each
//! owning a [`Generator`](crate::vm::Generator) over that name's
//! sub-factory plus its most-recently-produced output.
//!
//! Lookup is djb2 hash then string confirmation, linear over at most 32
//! entries — collisions are resolved by the string compare, so no property
//! of the hash beyond acceptable dispersion is assumed.

use crate::factory::Factory;
use crate::vm::{Generator, Output};

pub struct SubGeneratorCacheEntry {
    pub name: String,
    pub hash: u32,
    pub sub_generator: Generator,
    pub cached_output: Option<Output>,
}

pub struct ReferenceTable {
    entries: Vec<SubGeneratorCacheEntry>,
}

impl ReferenceTable {
    pub fn new(factory: &Factory) -> Self {
        let entries = factory
            .sub_factories()
            .iter()
            .map(|sub| SubGeneratorCacheEntry {
                name: sub.name.clone(),
                hash: sub.hash,
                sub_generator: Generator::new(sub.factory.clone(), sub.factory.max_output_size.max(1)),
                cached_output: None,
            })
            .collect();
        ReferenceTable { entries }
    }

    pub fn find_mut(&mut self, name: &str, hash: u32) -> Option<&mut SubGeneratorCacheEntry> {
        self.entries.iter_mut().find(|e| e.hash == hash && e.name == name)
    }

    /// Drops every cached output, as required when a `next()` call fails
    /// partway through and the generator context's per-call state resets.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.cached_output = None;
        }
    }
}
