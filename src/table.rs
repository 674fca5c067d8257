//! Write-once side-tables keyed by syntax-tree node

use crate::ast::NodeId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute table owned by one compiler run.
///
/// Each pass writes its own table and never revises an entry: a second write
/// to the same key is rejected and the first value is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTable<T> {
    entries: BTreeMap<NodeId, T>,
}

impl<T> Default for NodeTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> NodeTable<T> {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` for `id`; returns false (and keeps the old entry) if
    /// `id` was already described
    pub fn insert(&mut self, id: NodeId, value: T) -> bool {
        if self.entries.contains_key(&id) {
            tracing::trace!(node = %id, "rejected second write to side-table entry");
            return false;
        }
        self.entries.insert(id, value);
        true
    }

    /// Entry for `id`
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.entries.get(&id)
    }

    /// True if `id` has an entry
    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entry was written
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in node order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.entries.iter().map(|(id, v)| (*id, v))
    }
}
