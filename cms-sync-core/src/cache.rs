//! Per-run lookup of every entry and asset seen while fetching.
//!
//! Populated from page items and `includes`, then handed to the document
//! builder by reference. One cache lives for exactly one sync pass.

use std::collections::HashMap;

use crate::contract::{Includes, RawAsset, RawEntry};

#[derive(Debug, Default, Clone)]
pub struct EntryCache {
    entries: HashMap<String, RawEntry>,
    assets: HashMap<String, RawAsset>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First write wins: page items are inserted before includes, and an
    /// item carries at least as many fields as its included copy.
    pub fn insert_entry(&mut self, entry: RawEntry) {
        self.entries.entry(entry.id().to_string()).or_insert(entry);
    }

    pub fn insert_asset(&mut self, asset: RawAsset) {
        self.assets.entry(asset.id().to_string()).or_insert(asset);
    }

    pub fn extend_entries<I: IntoIterator<Item = RawEntry>>(&mut self, entries: I) {
        for entry in entries {
            self.insert_entry(entry);
        }
    }

    pub fn extend_includes(&mut self, includes: Includes) {
        self.extend_entries(includes.entries);
        for asset in includes.assets {
            self.insert_asset(asset);
        }
    }

    /// Evicts entries rejected by `keep`; returns how many were removed.
    pub fn retain_entries<F: FnMut(&RawEntry) -> bool>(&mut self, mut keep: F) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));
        before - self.entries.len()
    }

    pub fn entry(&self, id: &str) -> Option<&RawEntry> {
        self.entries.get(id)
    }

    pub fn asset(&self, id: &str) -> Option<&RawAsset> {
        self.assets.get(id)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}
