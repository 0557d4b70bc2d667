//! Conflict detection and resolution between rule interpretations
//!
//! All rules of a tick are interpreted against the same snapshot, so two
//! applicable interpretations may claim the same reference. This module
//! decides which of them commit.
//!
//! # Algorithm
//!
//! 1. Map every changed reference to the interpretations changing it
//! 2. Each interpretation's conflict set is the union of its co-changers
//! 3. Resolve the most entangled interpretations first, growing a Truth set
//!    (committed) and a Falsehood set (dropped)
//!
//! Resolution is total: every interpretation ends up in exactly one of the
//! two sets, and no two members of Truth share a changed reference.
//!
//! # Fairness
//!
//! When a conflict cannot be decided from earlier decisions, the target is
//! accepted with probability `w / (w + W)` where `w` is its scenario weight
//! and `W` the summed weight of its undecided rivals. Randomness comes from
//! the caller's [`Rng`], so a seed reproduces every decision.

use reflex_core::{Reference, Rng, RuleInterpretation};
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// One interpretation and the interpretations it shares a changed key with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConflict {
    /// Index of the interpretation being decided
    pub target: usize,
    /// Indices of every interpretation sharing at least one changed key
    pub others: BTreeSet<usize>,
}

impl RuleConflict {
    /// Whether this interpretation shares no key with any other
    pub fn is_free(&self) -> bool {
        self.others.is_empty()
    }
}

/// Conflicts for a batch of interpretations, in resolution order
#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    conflicts: Vec<RuleConflict>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if any interpretation contends with another
    pub fn has_conflicts(&self) -> bool {
        self.conflicts.iter().any(|c| !c.is_free())
    }

    /// Get the number of entries (one per interpretation)
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Iterate in resolution order
    pub fn iter(&self) -> impl Iterator<Item = &RuleConflict> {
        self.conflicts.iter()
    }

    /// The entry for a given interpretation
    pub fn get(&self, target: usize) -> Option<&RuleConflict> {
        self.conflicts.iter().find(|c| c.target == target)
    }
}

/// Detect which interpretations change a common reference
///
/// # Algorithm
///
/// 1. Build a HashMap from changed `Reference` to the indices changing it
/// 2. For each interpretation, union the index lists of its keys, minus itself
/// 3. Sort by conflict-set size, largest first; ties keep input order
///
/// # Complexity
///
/// O(k + n log n) where k = total changed keys and n = interpretations,
/// plus the size of the produced sets
///
/// # Returns
///
/// A `ConflictReport` with exactly one entry per interpretation
pub fn detect_conflicts(interpretations: &[RuleInterpretation]) -> ConflictReport {
    let mut by_key: HashMap<&Reference, Vec<usize>> = HashMap::new();
    for (index, interpretation) in interpretations.iter().enumerate() {
        for key in interpretation.keys() {
            by_key.entry(key).or_default().push(index);
        }
    }

    let mut conflicts: Vec<RuleConflict> = interpretations
        .iter()
        .enumerate()
        .map(|(index, interpretation)| {
            let others = interpretation
                .keys()
                .filter_map(|key| by_key.get(key))
                .flatten()
                .copied()
                .filter(|other| *other != index)
                .collect();
            RuleConflict {
                target: index,
                others,
            }
        })
        .collect();

    // sort_by is stable
    conflicts.sort_by(|a, b| b.others.len().cmp(&a.others.len()));
    ConflictReport { conflicts }
}

/// The outcome of resolving a conflict report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Interpretations to commit
    pub truth: BTreeSet<usize>,
    /// Interpretations dropped this tick
    pub falsehood: BTreeSet<usize>,
}

impl Resolution {
    pub fn is_accepted(&self, index: usize) -> bool {
        self.truth.contains(&index)
    }

    /// Accepted interpretations in input order
    pub fn accepted<'a>(
        &'a self,
        interpretations: &'a [RuleInterpretation],
    ) -> impl Iterator<Item = &'a RuleInterpretation> {
        self.truth.iter().filter_map(|i| interpretations.get(*i))
    }
}

/// Resolve a conflict report into committed and dropped interpretations
///
/// For each conflict, in report order:
/// - rivals already in Falsehood are ignored
/// - with no rival left, the target is accepted
/// - if a remaining rival is already accepted, the target is rejected
/// - otherwise one weighted draw decides between the target and its rivals
pub fn resolve_conflicts(
    interpretations: &[RuleInterpretation],
    report: &ConflictReport,
    rng: &mut Rng,
) -> Resolution {
    let mut resolution = Resolution::default();
    let weight = |i: usize| interpretations.get(i).map_or(0.0, |interp| interp.scenario_weight());

    for conflict in report.iter() {
        let rule = conflict.target;
        let remainder: BTreeSet<usize> = conflict
            .others
            .difference(&resolution.falsehood)
            .copied()
            .collect();

        if remainder.is_empty() {
            trace!(rule, "accept: no remaining rivals");
            resolution.truth.insert(rule);
            continue;
        }

        if !remainder.is_disjoint(&resolution.truth) {
            trace!(rule, "reject: a rival is already committed");
            resolution.falsehood.insert(rule);
            continue;
        }

        let own = weight(rule);
        let rivals: f64 = remainder.iter().map(|i| weight(*i)).sum();
        let accepted = rng.weighted_index(&[own, rivals]) == Some(0);
        trace!(rule, own, rivals, accepted, "weighted draw");
        if accepted {
            resolution.truth.insert(rule);
        } else {
            resolution.falsehood.insert(rule);
        }
    }

    resolution
}
