//! Change sets: the `(old, new)` record of effective values per reference
//!
//! A [`ChangeSet`] is what a rule interpretation claims, what a committed tick
//! pushes onto history, and what a backward tick inverts.
//!
//! # Overview
//!
//! - Rule interpretations report the references they consume, assign or target
//! - Conflict resolution compares the key sets of change sets
//! - The engine stores one change set per forward tick and inverts it on undo

use crate::{EntityValue, Reference};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Mapping of references to new values, as returned by context mutations.
///
/// Void flags appear as `reference.void` keys holding `{true}` (now void) or
/// the empty value (no longer void).
pub type Delta = IndexMap<Reference, EntityValue>;

/// The effective value of one reference before and after a mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Change {
    pub old: EntityValue,
    pub new: EntityValue,
}

impl Change {
    pub fn new(old: EntityValue, new: EntityValue) -> Self {
        Self { old, new }
    }

    /// Whether the old and new values are identical
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }

    /// Swap old and new
    pub fn inverted(&self) -> Change {
        Change::new(self.new.clone(), self.old.clone())
    }
}

/// An ordered collection of per-reference changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changes in first-touched order
    changes: IndexMap<Reference, Change>,
}

impl ChangeSet {
    /// Create a new empty ChangeSet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, replacing any earlier change for the same reference
    pub fn insert(&mut self, reference: Reference, change: Change) {
        self.changes.insert(reference, change);
    }

    pub fn get(&self, reference: &Reference) -> Option<&Change> {
        self.changes.get(reference)
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.changes.contains_key(reference)
    }

    /// The changed references
    pub fn keys(&self) -> impl Iterator<Item = &Reference> {
        self.changes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, &Change)> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Compose a later change set onto this one.
    ///
    /// For a reference touched by both, the earliest `old` and the latest `new`
    /// are kept; entries whose composition is a no-op are dropped.
    pub fn extend(&mut self, later: ChangeSet) {
        for (reference, change) in later.changes {
            match self.changes.get_mut(&reference) {
                Some(existing) => existing.new = change.new,
                None => {
                    self.changes.insert(reference, change);
                }
            }
        }
        self.changes.retain(|_, change| !change.is_noop());
    }

    /// Compose a sequence of change sets in order
    pub fn compose(sets: impl IntoIterator<Item = ChangeSet>) -> ChangeSet {
        let mut out = ChangeSet::new();
        for set in sets {
            out.extend(set);
        }
        out
    }

    /// The change set restoring every `old` value
    pub fn inverted(&self) -> ChangeSet {
        ChangeSet {
            changes: self
                .changes
                .iter()
                .map(|(reference, change)| (reference.clone(), change.inverted()))
                .collect(),
        }
    }

    /// The new values keyed by reference
    pub fn into_delta(self) -> Delta {
        self.changes
            .into_iter()
            .map(|(reference, change)| (reference, change.new))
            .collect()
    }
}

impl Hash for ChangeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.changes.len().hash(state);
        for (reference, change) in &self.changes {
            reference.hash(state);
            change.hash(state);
        }
    }
}

impl FromIterator<(Reference, Change)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (Reference, Change)>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChangeSet {
    type Item = (Reference, Change);
    type IntoIter = indexmap::map::IntoIter<Reference, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (reference, change)) in self.changes.iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {} -> {}", reference, change.old, change.new)?;
        }
        Ok(())
    }
}
