//! Ontology graph: the declared reference hierarchy
//!
//! The graph knows every reference that was declared up front or that a
//! registered rule mentions. Rule contributions are tracked by rule source so
//! that removing a rule withdraws exactly the references only it introduced.

use indexmap::{IndexMap, IndexSet};
use reflex_core::Reference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Declared references, their type tags, and per-rule contributions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    /// Base declarations with merged type tags
    declared: IndexMap<Reference, BTreeSet<String>>,
    /// References mentioned by each registered rule
    contributions: IndexMap<String, Vec<Reference>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a reference and all of its ancestors.
    ///
    /// Type tags on the reference are merged with any already declared.
    pub fn declare(&mut self, reference: &Reference) {
        let reference = reference.non_void();
        if reference.is_root() {
            return;
        }
        for depth in 1..reference.depth() {
            self.declared
                .entry(reference.ancestor_at(depth))
                .or_default();
        }
        self.declared
            .entry(reference.clone())
            .or_default()
            .extend(reference.types().iter().cloned());
    }

    /// Record the references a rule mentions, replacing any earlier record
    pub fn contribute(&mut self, source: impl Into<String>, references: impl IntoIterator<Item = Reference>) {
        let mut seen = IndexSet::new();
        for reference in references {
            let reference = reference.non_void();
            if reference.is_root() {
                continue;
            }
            for depth in 1..reference.depth() {
                seen.insert(reference.ancestor_at(depth));
            }
            seen.insert(reference);
        }
        self.contributions.insert(source.into(), seen.into_iter().collect());
    }

    /// Forget a rule's contribution; false if the rule contributed nothing
    pub fn withdraw(&mut self, source: &str) -> bool {
        self.contributions.shift_remove(source).is_some()
    }

    /// Whether a reference is known through declaration or any contribution
    pub fn contains(&self, reference: &Reference) -> bool {
        let reference = reference.non_void();
        self.declared.contains_key(&reference)
            || self.contributions.values().any(|refs| refs.contains(&reference))
    }

    /// Every known reference, declarations first
    pub fn references(&self) -> Vec<Reference> {
        let mut out: IndexSet<Reference> = self.declared.keys().cloned().collect();
        for refs in self.contributions.values() {
            out.extend(refs.iter().cloned());
        }
        out.into_iter().collect()
    }

    pub fn parent(&self, reference: &Reference) -> Option<Reference> {
        reference.non_void().parent().filter(|p| !p.is_root())
    }

    /// Known references directly below `reference`
    pub fn children(&self, reference: &Reference) -> Vec<Reference> {
        let reference = reference.non_void();
        self.references()
            .into_iter()
            .filter(|r| r.parent().as_ref() == Some(&reference))
            .collect()
    }

    /// Known references sharing a parent with `reference`, excluding itself
    pub fn siblings(&self, reference: &Reference) -> Vec<Reference> {
        let reference = reference.non_void();
        let parent = reference.parent().unwrap_or_else(Reference::root);
        self.children(&parent)
            .into_iter()
            .filter(|r| *r != reference)
            .collect()
    }

    /// Declared type tags of a reference
    pub fn types_of(&self, reference: &Reference) -> BTreeSet<String> {
        self.declared
            .get(&reference.non_void())
            .cloned()
            .unwrap_or_default()
    }

    /// The reference carrying its declared type tags
    pub fn typed(&self, reference: &Reference) -> Reference {
        reference.clone().with_types(self.types_of(reference))
    }

    pub fn len(&self) -> usize {
        self.references().len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty() && self.contributions.values().all(Vec::is_empty)
    }

    /// Sorted view for order-independent comparison
    fn canonical(&self) -> (Vec<(&Reference, &BTreeSet<String>)>, Vec<(&String, BTreeSet<&Reference>)>) {
        let mut declared: Vec<_> = self.declared.iter().collect();
        declared.sort_by(|a, b| a.0.cmp(b.0));
        let mut contributions: Vec<_> = self
            .contributions
            .iter()
            .map(|(source, refs)| (source, refs.iter().collect::<BTreeSet<_>>()))
            .collect();
        contributions.sort_by(|a, b| a.0.cmp(b.0));
        (declared, contributions)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Graph {}

impl Hash for Graph {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}
