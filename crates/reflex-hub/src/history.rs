//! Undo history: a LIFO stack of committed change sets

use reflex_core::ChangeSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Committed tick diffs, newest last
///
/// With a non-zero `limit` the oldest entry is evicted when a push would
/// exceed it, which bounds how far back the engine can tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct History {
    entries: VecDeque<ChangeSet>,
    limit: usize,
}

impl History {
    /// An unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// A history keeping at most `limit` entries; 0 means unbounded
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, changes: ChangeSet) {
        if self.limit > 0 && self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(changes);
    }

    pub fn pop(&mut self) -> Option<ChangeSet> {
        self.entries.pop_back()
    }

    /// The most recent entry
    pub fn peek(&self) -> Option<&ChangeSet> {
        self.entries.back()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &ChangeSet> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::{Change, EntityValue, Reference};

    fn set(name: &str) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.insert(
            Reference::new(name),
            Change::new(EntityValue::empty(), EntityValue::truthy()),
        );
        changes
    }

    #[test]
    fn test_lifo() {
        let mut history = History::new();
        history.push(set("a"));
        history.push(set("b"));
        assert_eq!(history.depth(), 2);
        assert_eq!(history.peek(), Some(&set("b")));
        assert_eq!(history.pop(), Some(set("b")));
        assert_eq!(history.pop(), Some(set("a")));
        assert_eq!(history.pop(), None);
        assert!(history.is_empty());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = History::with_limit(2);
        history.push(set("a"));
        history.push(set("b"));
        history.push(set("c"));
        assert_eq!(history.depth(), 2);
        let names: Vec<_> = history
            .iter()
            .flat_map(|c| c.keys().cloned())
            .collect();
        assert_eq!(names, vec![Reference::new("b"), Reference::new("c")]);
    }
}
