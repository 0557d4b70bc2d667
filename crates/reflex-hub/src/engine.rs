//! Engine - ticks a rule set over a context
//!
//! The engine owns the context, the compiled rules, the ontology graph and
//! the undo history. A forward tick interprets every rule against the same
//! pre-tick snapshot, resolves conflicts, commits the winners as one batch
//! and records the diff. A backward tick pops recorded diffs and applies
//! their inverses without running any rule logic.

use crate::commit::{apply_changes, commit};
use crate::config::EngineConfig;
use crate::conflict::{detect_conflicts, resolve_conflicts};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::hash::hash_with_seed;
use crate::history::History;
use indexmap::IndexMap;
use reflex_core::{
    ChangeSet, EngineContext, EntityValue, Reference, Rng, RuleExpression, RuleInterpretation,
    RuleInterpreter,
};
use std::hash::{Hash, Hasher};
use tracing::info;

/// Central coordinator for one rule set and its state
///
/// ```
/// use reflex_core::{EntityValue, Expr, Reference, RuleExpression};
/// use reflex_hub::Engine;
///
/// let rule = RuleExpression::chain(vec![Expr::reference("one"), Expr::reference("two")]).unwrap();
/// let mut engine = Engine::new();
/// engine.add(vec![rule]).unwrap();
/// engine.activate(&Reference::new("one"), EntityValue::truthy()).unwrap();
///
/// let diff = engine.tick(1).unwrap();
/// assert!(diff.contains(&Reference::new("two")));
/// assert_eq!(engine.query(&Reference::new("two")), Some(EntityValue::truthy()));
///
/// engine.tick(-1).unwrap();
/// assert_eq!(engine.query(&Reference::new("one")), Some(EntityValue::truthy()));
/// ```
#[derive(Clone)]
pub struct Engine {
    /// Compiled rules keyed by source
    interpreters: IndexMap<String, RuleInterpreter>,
    context: EngineContext,
    history: History,
    graph: Graph,
    rng: Rng,
    config: EngineConfig,
    /// Forward ticks minus backward ticks
    tick: u64,
}

impl Engine {
    /// Create an engine with the default configuration and an empty context
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            interpreters: IndexMap::new(),
            context: EngineContext::new(),
            history: History::with_limit(config.max_history),
            graph: Graph::new(),
            rng: Rng::new(config.seed),
            config,
            tick: 0,
        }
    }

    /// Replace the context; every non-void reference in it is declared
    pub fn with_context(mut self, context: EngineContext) -> Self {
        for reference in context.references() {
            self.graph.declare(&reference);
        }
        self.context = context;
        self
    }

    /// Add rules and return the engine
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = RuleExpression>) -> Result<Self> {
        self.add(rules)?;
        Ok(self)
    }

    /// Run `count` forward ticks, or `-count` backward ticks when negative.
    ///
    /// Returns the composition of the diffs of every step. A backward tick
    /// past the recorded history fails with [`Error::HistoryExhausted`] and
    /// changes nothing.
    pub fn tick(&mut self, count: i64) -> Result<ChangeSet> {
        if count >= 0 {
            let mut diffs = Vec::new();
            for _ in 0..count {
                diffs.push(self.step_forward()?);
            }
            return Ok(ChangeSet::compose(diffs));
        }

        let requested = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
        if requested > self.history.depth() {
            return Err(Error::HistoryExhausted {
                requested,
                available: self.history.depth(),
            });
        }

        let mut diffs = Vec::new();
        for _ in 0..requested {
            diffs.push(self.step_backward()?);
        }
        Ok(ChangeSet::compose(diffs))
    }

    fn step_forward(&mut self) -> Result<ChangeSet> {
        let snapshot = self.context.clone();

        let mut applicable = Vec::new();
        for interpreter in self.interpreters.values() {
            let interpretation = interpreter.interpret(&snapshot)?;
            if interpretation.is_applicable() {
                applicable.push(interpretation);
            }
        }

        let report = detect_conflicts(&applicable);
        let resolution = resolve_conflicts(&applicable, &report, &mut self.rng);

        let mut next = snapshot.clone();
        let committed = commit(&mut next, &applicable, &resolution)?;
        let diff = EngineContext::get_diff(&snapshot, &next);

        self.history.push(EngineContext::get_anchored_diff(&snapshot, &next));
        self.context = next;
        self.tick += 1;

        info!(
            tick = self.tick,
            applicable = applicable.len(),
            committed = committed.rules.len(),
            changed = diff.len(),
            "committed tick"
        );
        Ok(diff)
    }

    fn step_backward(&mut self) -> Result<ChangeSet> {
        let Some(recorded) = self.history.peek() else {
            return Err(Error::HistoryExhausted {
                requested: 1,
                available: 0,
            });
        };
        let inverse = recorded.inverted();

        let mut next = self.context.clone();
        apply_changes(&mut next, &inverse)?;
        let diff = EngineContext::get_diff(&self.context, &next);

        self.history.pop();
        self.context = next;
        self.tick = self.tick.saturating_sub(1);

        info!(tick = self.tick, changed = diff.len(), "undid tick");
        Ok(diff)
    }

    /// Change a reference directly, bypassing rules and history
    pub fn activate(&mut self, reference: &Reference, value: EntityValue) -> Result<ChangeSet> {
        let before = self.context.clone();
        self.graph.declare(reference);
        self.context.change(reference, value)?;
        Ok(EngineContext::get_diff(&before, &self.context))
    }

    /// Void the subtree at a reference, bypassing rules and history
    pub fn deactivate(&mut self, reference: &Reference) -> Result<ChangeSet> {
        let before = self.context.clone();
        self.context.change(&reference.void(), EntityValue::truthy())?;
        Ok(EngineContext::get_diff(&before, &self.context))
    }

    /// Current effective value, or `None` if the reference was never set
    pub fn query(&self, reference: &Reference) -> Option<EntityValue> {
        self.context.get(reference)
    }

    /// All non-void active references with their values
    pub fn active(&self) -> IndexMap<Reference, EntityValue> {
        self.context.active()
    }

    /// Declare a reference in the ontology graph
    pub fn declare(&mut self, reference: &Reference) {
        self.graph.declare(reference);
    }

    /// Declare a free variable: while inactive it evaluates symbolically
    pub fn declare_symbolic(&mut self, reference: &Reference) {
        self.graph.declare(reference);
        self.context.declare_symbolic(reference.clone());
    }

    /// Compile and register rules.
    ///
    /// A rule with the same source as a registered one replaces it. Nothing
    /// is registered if any rule fails to compile.
    pub fn add(&mut self, rules: impl IntoIterator<Item = RuleExpression>) -> Result<()> {
        let compiled = rules
            .into_iter()
            .map(RuleInterpreter::new)
            .collect::<reflex_core::Result<Vec<_>>>()?;

        for interpreter in compiled {
            let source = interpreter.source().to_string();
            self.graph.contribute(source.clone(), interpreter.references());
            self.interpreters.insert(source, interpreter);
        }
        Ok(())
    }

    /// Unregister rules by source.
    ///
    /// Fails with [`Error::UnknownRule`] and removes nothing if any source is
    /// not registered.
    pub fn remove<I, S>(&mut self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources: Vec<S> = sources.into_iter().collect();
        if let Some(missing) = sources
            .iter()
            .find(|s| !self.interpreters.contains_key(s.as_ref()))
        {
            return Err(Error::UnknownRule(missing.as_ref().to_string()));
        }

        for source in &sources {
            self.interpreters.shift_remove(source.as_ref());
            self.graph.withdraw(source.as_ref());
        }
        Ok(())
    }

    /// Interpret every rule against the current context without committing
    pub fn interpret(&self) -> Result<Vec<RuleInterpretation>> {
        self.interpreters
            .values()
            .map(|interpreter| interpreter.interpret(&self.context).map_err(Error::from))
            .collect()
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the current tick
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Registered rules in registration order
    pub fn rules(&self) -> impl Iterator<Item = &RuleExpression> {
        self.interpreters.values().map(RuleInterpreter::expression)
    }

    /// Registered rule sources in registration order
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.interpreters.keys().map(String::as_str)
    }

    /// Deterministic fingerprint over context, rules, graph and history
    pub fn fingerprint(&self) -> u64 {
        hash_with_seed(self, self.config.fingerprint_seed)
    }

    fn sorted_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.sources().collect();
        sources.sort_unstable();
        sources
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Engine {
    fn eq(&self, other: &Self) -> bool {
        self.context == other.context
            && self.sorted_sources() == other.sorted_sources()
            && self.graph == other.graph
            && self.history == other.history
    }
}

impl Eq for Engine {}

impl Hash for Engine {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.context.hash(state);
        self.sorted_sources().hash(state);
        self.graph.hash(state);
        self.history.hash(state);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tick", &self.tick)
            .field("rules", &self.interpreters.len())
            .field("active", &self.context.active().len())
            .field("history", &self.history.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_core::{CmpOp, Clause, Expr, RuleOperator, Value};

    fn r(s: &str) -> Reference {
        s.parse().unwrap()
    }

    fn chain(names: &[&str]) -> RuleExpression {
        RuleExpression::chain(names.iter().map(|n| Expr::reference(n)).collect()).unwrap()
    }

    fn is_active(engine: &Engine, name: &str) -> bool {
        engine.query(&r(name)).is_some_and(|v| v.is_truthy())
    }

    /// `One->Two`, `Two&Three->Four`, `Four->Five`, `Six->Seven`,
    /// `One->Three->Five` with One, Two, Three, Four and Six active
    fn chained_engine(seed: u64) -> Engine {
        let both = RuleExpression::chain(vec![
            Expr::and(Expr::reference("two"), Expr::reference("three")),
            Expr::reference("four"),
        ])
        .unwrap();
        let mut engine = Engine::from_config(EngineConfig::default().with_seed(seed))
            .with_rules(vec![
                chain(&["one", "two"]),
                both,
                chain(&["four", "five"]),
                chain(&["six", "seven"]),
                chain(&["one", "three", "five"]),
            ])
            .unwrap();
        for name in ["one", "two", "three", "four", "six"] {
            engine.activate(&r(name), EntityValue::truthy()).unwrap();
        }
        engine
    }

    #[test]
    fn test_tick_moves_state() {
        let mut engine = Engine::new().with_rules(vec![chain(&["one", "two"])]).unwrap();
        engine.activate(&r("one"), EntityValue::truthy()).unwrap();

        let diff = engine.tick(1).unwrap();
        assert_eq!(engine.current_tick(), 1);
        assert!(!is_active(&engine, "one"));
        assert!(is_active(&engine, "two"));
        assert_eq!(diff.len(), 2);
        assert_eq!(engine.history().depth(), 1);

        // nothing left to fire
        let diff = engine.tick(1).unwrap();
        assert!(diff.is_empty());
        assert_eq!(engine.history().depth(), 2);
    }

    #[test]
    fn test_undo_restores_snapshot() {
        let mut engine = chained_engine(1);
        for _ in 0..20 {
            let before = engine.clone();
            engine.tick(1).unwrap();
            engine.tick(-1).unwrap();
            assert_eq!(engine, before);
            assert_eq!(engine.fingerprint(), before.fingerprint());
        }
    }

    #[test]
    fn test_undo_restores_valued_ancestor() {
        let mut engine = Engine::new().with_rules(vec![chain(&["go", "a.b"])]).unwrap();
        engine.activate(&r("a"), EntityValue::truthy()).unwrap();
        engine.activate(&r("go"), EntityValue::truthy()).unwrap();
        let before = engine.clone();

        let diff = engine.tick(1).unwrap();
        assert!(!diff.contains(&r("a")));
        assert!(is_active(&engine, "a.b"));
        assert_eq!(engine.query(&r("a")), Some(EntityValue::truthy()));

        engine.tick(-1).unwrap();
        assert_eq!(engine.query(&r("a")), Some(EntityValue::truthy()));
        assert_eq!(engine.context(), before.context());
        assert_eq!(engine, before);
    }

    #[test]
    fn test_multi_step_undo() {
        let mut engine = Engine::new()
            .with_rules(vec![chain(&["a", "b"]), chain(&["b", "c"])])
            .unwrap();
        engine.activate(&r("a"), EntityValue::truthy()).unwrap();
        let start = engine.clone();

        engine.tick(2).unwrap();
        assert!(is_active(&engine, "c"));
        assert_eq!(engine.current_tick(), 2);

        engine.tick(-2).unwrap();
        assert_eq!(engine, start);
        assert_eq!(engine.current_tick(), 0);
    }

    #[test]
    fn test_history_exhausted() {
        let mut engine = Engine::new().with_rules(vec![chain(&["a", "b"])]).unwrap();
        engine.activate(&r("a"), EntityValue::truthy()).unwrap();
        engine.tick(1).unwrap();
        let after = engine.clone();

        let err = engine.tick(-2).unwrap_err();
        assert!(matches!(
            err,
            Error::HistoryExhausted {
                requested: 2,
                available: 1
            }
        ));
        assert_eq!(engine, after);
    }

    #[test]
    fn test_max_history_bounds_undo() {
        let config = EngineConfig::default().with_max_history(1);
        let mut engine = Engine::from_config(config)
            .with_rules(vec![chain(&["a", "b"]), chain(&["b", "c"])])
            .unwrap();
        engine.activate(&r("a"), EntityValue::truthy()).unwrap();
        engine.tick(2).unwrap();
        assert_eq!(engine.history().depth(), 1);
        assert!(engine.tick(-2).is_err());
        engine.tick(-1).unwrap();
        assert!(is_active(&engine, "b"));
    }

    #[test]
    fn test_chained_outcomes_are_consistent() {
        let mut engine = chained_engine(42);
        for _ in 0..5000 {
            let diff = engine.tick(1).unwrap();
            // r4 never conflicts
            assert!(diff.contains(&r("seven")));
            let r1 = !is_active(&engine, "one") && is_active(&engine, "three");
            let r2 = !is_active(&engine, "two");
            let r5 = !is_active(&engine, "three") && is_active(&engine, "two");
            assert_eq!([r1, r2, r5].iter().filter(|b| **b).count(), 1);
            engine.tick(-1).unwrap();
        }
    }

    #[test]
    fn test_chained_outcome_frequencies() {
        let mut engine = chained_engine(2024);
        let trials = 6000;
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            engine.tick(1).unwrap();
            if !is_active(&engine, "two") {
                counts[1] += 1;
            } else if !is_active(&engine, "three") {
                counts[2] += 1;
            } else {
                counts[0] += 1;
            }
            engine.tick(-1).unwrap();
        }
        let freq = |i: usize| counts[i] as f64 / trials as f64;
        assert!((freq(0) - 0.5).abs() < 0.05, "{:?}", counts);
        assert!((freq(1) - 0.25).abs() < 0.05, "{:?}", counts);
        assert!((freq(2) - 0.25).abs() < 0.05, "{:?}", counts);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = chained_engine(9);
        let mut b = chained_engine(9);
        for _ in 0..10 {
            assert_eq!(a.tick(1).unwrap(), b.tick(1).unwrap());
            a.tick(-1).unwrap();
            b.tick(-1).unwrap();
        }
    }

    #[test]
    fn test_activate_deactivate_query() {
        let mut engine = Engine::new();
        assert_eq!(engine.query(&r("lamp")), None);

        let diff = engine.activate(&r("lamp.on"), EntityValue::truthy()).unwrap();
        assert!(diff.contains(&r("lamp")));
        assert!(diff.contains(&r("lamp.on")));
        assert!(is_active(&engine, "lamp"));
        assert!(engine.graph().contains(&r("lamp.on")));
        assert_eq!(engine.active().len(), 2);

        let diff = engine.deactivate(&r("lamp")).unwrap();
        assert_eq!(diff.len(), 2);
        assert!(!is_active(&engine, "lamp.on"));
        assert!(engine.context().is_void(&r("lamp")));
        assert!(engine.active().is_empty());

        // activation is not recorded
        assert!(engine.history().is_empty());
        assert!(engine.deactivate(&r("lamp")).unwrap().is_empty());
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let mut engine = Engine::new();
        engine.add(vec![chain(&["a", "b"]), chain(&["a", "b"])]).unwrap();
        assert_eq!(engine.sources().collect::<Vec<_>>(), vec!["a -> b"]);
        assert!(engine.graph().contains(&r("b")));

        assert!(matches!(
            engine.remove(["a -> b", "nope"]),
            Err(Error::UnknownRule(s)) if s == "nope"
        ));
        assert_eq!(engine.rules().count(), 1);

        engine.remove(["a -> b"]).unwrap();
        assert_eq!(engine.rules().count(), 0);
        assert!(!engine.graph().contains(&r("b")));
    }

    #[test]
    fn test_equality_ignores_rule_order() {
        let a = Engine::new()
            .with_rules(vec![chain(&["a", "b"]), chain(&["c", "d"])])
            .unwrap();
        let b = Engine::new()
            .with_rules(vec![chain(&["c", "d"]), chain(&["a", "b"])])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = Engine::new().with_rules(vec![chain(&["a", "b"])]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_failing_rule_does_not_abort_tick() {
        let bad = RuleExpression::new(
            vec![
                Clause::query(Expr::reference("go")),
                Clause::assign(
                    "ratio",
                    Expr::arith(reflex_core::ArithOp::Div, Expr::lit(1), Expr::reference("free")),
                ),
            ],
            vec![RuleOperator::observe()],
        )
        .unwrap();
        let mut engine = Engine::new()
            .with_rules(vec![bad, chain(&["go", "went"])])
            .unwrap();
        engine.declare_symbolic(&r("free"));
        engine.activate(&r("go"), EntityValue::truthy()).unwrap();

        let interps = engine.interpret().unwrap();
        assert!(interps[0].reason.is_some());
        assert!(interps[1].is_applicable());

        engine.tick(1).unwrap();
        assert!(is_active(&engine, "went"));
        assert_eq!(engine.query(&r("ratio")), None);
    }

    #[test]
    fn test_guarded_assignment() {
        let rule = RuleExpression::new(
            vec![
                Clause::query(Expr::compare(CmpOp::Ge, Expr::reference("temp"), Expr::lit(30))),
                Clause::assign("fan", Expr::lit(Value::from("high"))),
            ],
            vec![RuleOperator::observe()],
        )
        .unwrap();
        let mut engine = Engine::new().with_rules(vec![rule]).unwrap();
        engine.activate(&r("temp"), EntityValue::from(20i64)).unwrap();
        engine.tick(1).unwrap();
        assert_eq!(engine.query(&r("fan")), None);

        engine.activate(&r("temp"), EntityValue::from(35i64)).unwrap();
        engine.tick(1).unwrap();
        assert_eq!(engine.query(&r("fan")), Some(EntityValue::from("high")));
        assert!(is_active(&engine, "temp"));
    }
}
