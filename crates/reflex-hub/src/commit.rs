//! Applying resolved interpretations and change sets to a context
//!
//! - [`commit`]: apply every accepted interpretation as one batch
//! - [`apply_changes`]: apply the `new` side of a change set (used for undo)
//!
//! Both write deeper references before shallower ones, so a parent written
//! in the same batch as its child ends up with the value written for it.

use crate::conflict::Resolution;
use crate::Result;
use reflex_core::{ChangeSet, EngineContext, EntityValue, Reference, RuleInterpretation};
use tracing::debug;

/// Result of a successful commit
#[derive(Debug, Clone, Default)]
pub struct CommitResult {
    /// Sources of the committed rules, in input order
    pub rules: Vec<String>,
    /// Number of node writes performed
    pub writes: usize,
}

impl CommitResult {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Apply the changes of every accepted interpretation to `context`
///
/// Accepted interpretations never share a changed reference, so the batch
/// order only matters between ancestors and descendants.
pub fn commit(
    context: &mut EngineContext,
    interpretations: &[RuleInterpretation],
    resolution: &Resolution,
) -> Result<CommitResult> {
    let mut result = CommitResult::default();
    let mut writes: Vec<(&Reference, &EntityValue)> = Vec::new();

    for interpretation in resolution.accepted(interpretations) {
        result.rules.push(interpretation.source.clone());
        writes.extend(interpretation.changes.iter().map(|(r, c)| (r, &c.new)));
    }

    result.writes = writes.len();
    write_deepest_first(context, writes)?;
    debug!(
        committed = result.rules.len(),
        writes = result.writes,
        "committed interpretations"
    );
    Ok(result)
}

/// Apply the `new` value of every change in `changes`
pub fn apply_changes(context: &mut EngineContext, changes: &ChangeSet) -> Result<()> {
    write_deepest_first(context, changes.iter().map(|(r, c)| (r, &c.new)).collect())
}

fn write_deepest_first(
    context: &mut EngineContext,
    mut writes: Vec<(&Reference, &EntityValue)>,
) -> Result<()> {
    // sort_by is stable, so equal depths keep batch order
    writes.sort_by(|a, b| b.0.depth().cmp(&a.0.depth()));
    for (reference, value) in writes {
        context.change(reference, value.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{detect_conflicts, resolve_conflicts};
    use reflex_core::{Change, InterpretationState, Rng};

    fn r(s: &str) -> Reference {
        s.parse().unwrap()
    }

    fn moving(source: &str, from: &str, to: &str) -> RuleInterpretation {
        let mut interp = RuleInterpretation::not_applicable(source, None);
        interp.state = InterpretationState::Applicable;
        interp.changes.insert(r(from), Change::new(EntityValue::truthy(), EntityValue::empty()));
        interp.changes.insert(r(to), Change::new(EntityValue::empty(), EntityValue::truthy()));
        interp
    }

    #[test]
    fn test_commit_applies_only_accepted() {
        let mut ctx = EngineContext::new();
        ctx.change(&r("one"), EntityValue::truthy()).unwrap();

        let interps = vec![moving("one -> two", "one", "two"), moving("one -> three", "one", "three")];
        let report = detect_conflicts(&interps);
        let resolution = resolve_conflicts(&interps, &report, &mut Rng::new(5));
        assert_eq!(resolution.truth.len(), 1);

        let result = commit(&mut ctx, &interps, &resolution).unwrap();
        assert!(!result.is_empty());
        assert_eq!(result.rules.len(), 1);
        assert_eq!(result.writes, 2);
        assert!(!ctx.get(&r("one")).unwrap_or_default().is_truthy());
        let two = ctx.get(&r("two")).unwrap_or_default().is_truthy();
        let three = ctx.get(&r("three")).unwrap_or_default().is_truthy();
        assert!(two ^ three);
    }

    #[test]
    fn test_apply_changes_restores_nested() {
        let mut ctx = EngineContext::new();
        let before = ctx.clone();
        ctx.change(&r("house.door"), EntityValue::truthy()).unwrap();

        let diff = EngineContext::get_diff(&before, &ctx);
        assert!(diff.contains(&r("house")));
        assert!(diff.contains(&r("house.door")));

        apply_changes(&mut ctx, &diff.inverted()).unwrap();
        assert_eq!(ctx, before);
    }

    #[test]
    fn test_apply_changes_writes_ancestors_last() {
        let mut ctx = EngineContext::new();
        ctx.change(&r("room"), EntityValue::truthy()).unwrap();
        let before = ctx.clone();
        ctx.change(&r("room.lamp"), EntityValue::truthy()).unwrap();

        let diff = EngineContext::get_anchored_diff(&before, &ctx);
        assert_eq!(diff.keys().next(), Some(&r("room.lamp")));
        apply_changes(&mut ctx, &diff.inverted()).unwrap();
        assert_eq!(ctx, before);
        assert_eq!(ctx.node(&r("room")).map(|n| n.own().clone()), Some(EntityValue::truthy()));
    }
}
