//! Clause interpreters and the rule interpreter
//!
//! Each clause compiles once into a [`Plan`]. A [`RuleInterpreter`] walks its
//! clauses left to right over a private copy of the context, spending or
//! observing matched state and assigning the accumulated result to its
//! targets.

use crate::rule::{Behavior, Clause, InterpretationState, Role, RuleExpression, RuleInterpretation};
use crate::{Change, ChangeSet, EngineContext, EntityValue, EvalMode, Expr, Plan, Reference, Result};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Evaluates a guard clause to an entity value
#[derive(Debug, Clone)]
pub struct QueryInterpreter {
    plan: Plan,
}

impl QueryInterpreter {
    pub fn new(expr: &Expr) -> Self {
        Self { plan: expr.compile() }
    }

    pub fn evaluate(&self, ctx: &EngineContext) -> Result<EntityValue> {
        self.plan.eval(ctx, EvalMode::Value)
    }

    pub fn references(&self) -> &[Reference] {
        self.plan.references()
    }
}

/// Evaluates the right-hand side and changes the target reference
#[derive(Debug, Clone)]
pub struct AssignmentInterpreter {
    target: Reference,
    plan: Plan,
}

impl AssignmentInterpreter {
    pub fn new(target: Reference, value: &Expr) -> Self {
        Self {
            target,
            plan: value.compile(),
        }
    }

    pub fn target(&self) -> &Reference {
        &self.target
    }

    /// Writes the evaluated value to the target
    pub fn evaluate(&self, ctx: &mut EngineContext) -> Result<()> {
        let value = self.plan.eval(ctx, EvalMode::Value)?;
        ctx.change(&self.target, value)?;
        Ok(())
    }
}

/// Evaluates a weighting expression into scenario weights
#[derive(Debug, Clone)]
pub struct ScenarioInterpreter {
    plan: Plan,
}

impl ScenarioInterpreter {
    pub fn new(expr: &Expr) -> Self {
        Self { plan: expr.compile() }
    }

    /// Numeric members become weights. A truthy value without numbers weighs
    /// its probability; a falsy value weighs nothing.
    pub fn evaluate(&self, ctx: &EngineContext) -> Result<Vec<f64>> {
        let value = self.plan.eval(ctx, EvalMode::Value)?;
        let weights: Vec<f64> = value.numbers().filter(|n| n.is_finite() && *n >= 0.0).collect();
        if !weights.is_empty() {
            return Ok(weights);
        }
        Ok(vec![if value.is_truthy() { value.probability() } else { 0.0 }])
    }
}

/// Evaluates a terminal clause in target mode to pick the references that
/// receive a rule's result
#[derive(Debug, Clone)]
pub struct TargetInterpreter {
    plan: Plan,
}

impl TargetInterpreter {
    pub fn new(expr: &Expr) -> Self {
        Self { plan: expr.compile() }
    }

    pub fn evaluate(&self, ctx: &EngineContext) -> Result<Vec<Reference>> {
        let value = self.plan.eval(ctx, EvalMode::Target)?;
        Ok(value.symbols().cloned().collect())
    }
}

/// A compiled clause
#[derive(Debug, Clone)]
pub enum ClauseInterpreter {
    Query(QueryInterpreter),
    Assignment(AssignmentInterpreter),
    Scenario(ScenarioInterpreter),
}

impl ClauseInterpreter {
    pub fn new(clause: &Clause) -> Self {
        match clause {
            Clause::Query(e) => ClauseInterpreter::Query(QueryInterpreter::new(e)),
            Clause::Action(a) => ClauseInterpreter::Assignment(AssignmentInterpreter::new(a.target.clone(), &a.value)),
            Clause::Scenario(e) => ClauseInterpreter::Scenario(ScenarioInterpreter::new(e)),
        }
    }
}

/// Mutable state of one walk over a rule's clauses
struct Walk {
    running: EngineContext,
    carry: EntityValue,
    roles: IndexMap<Reference, Role>,
    scenarios: Vec<f64>,
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct RuleInterpreter {
    expression: RuleExpression,
    source: String,
    clauses: Vec<ClauseInterpreter>,
    target: Option<TargetInterpreter>,
}

impl RuleInterpreter {
    pub fn new(expression: RuleExpression) -> Result<Self> {
        expression.validate()?;
        let clauses = expression.clauses.iter().map(ClauseInterpreter::new).collect();
        let target = match expression.clauses.last() {
            Some(Clause::Query(e)) if expression.clauses.len() > 1 => Some(TargetInterpreter::new(e)),
            _ => None,
        };
        Ok(Self {
            source: expression.source(),
            expression,
            clauses,
            target,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &RuleExpression {
        &self.expression
    }

    /// Every reference named anywhere in the rule
    pub fn references(&self) -> Vec<Reference> {
        let mut out: Vec<Reference> = Vec::new();
        for clause in &self.expression.clauses {
            let refs = match clause {
                Clause::Query(e) | Clause::Scenario(e) => e.references(),
                Clause::Action(a) => {
                    let mut refs = vec![a.target.clone()];
                    refs.extend(a.value.references());
                    refs
                }
            };
            for r in refs {
                if !out.contains(&r) {
                    out.push(r);
                }
            }
        }
        out
    }

    /// Interpret the rule against a context snapshot.
    ///
    /// The snapshot is never modified. Recoverable evaluation errors make the
    /// rule not applicable with the error as the reason; any other error is
    /// returned.
    pub fn interpret(&self, ctx: &EngineContext) -> Result<RuleInterpretation> {
        let mut walk = Walk {
            running: ctx.clone(),
            carry: EntityValue::truthy(),
            roles: IndexMap::new(),
            scenarios: Vec::new(),
        };

        let state = match self.walk(&mut walk) {
            Ok(state) => state,
            Err(e) if e.is_recoverable() => {
                warn!(rule = %self.source, error = %e, "rule evaluation failed");
                return Ok(RuleInterpretation::not_applicable(&self.source, Some(e.to_string())));
            }
            Err(e) => return Err(e),
        };

        let interpretation = match state {
            InterpretationState::Applicable => {
                let mut changes = ChangeSet::new();
                for (reference, role) in &walk.roles {
                    if *role == Role::Observe {
                        continue;
                    }
                    let old = ctx.get(reference).unwrap_or_default();
                    let new = walk.running.get(reference).unwrap_or_default();
                    changes.insert(reference.clone(), Change::new(old, new));
                }
                RuleInterpretation {
                    state,
                    changes,
                    source: self.source.clone(),
                    scenarios: walk.scenarios,
                    roles: walk.roles,
                    target_kind: self.expression.target_kind(),
                    reason: None,
                }
            }
            _ => {
                let mut skipped = RuleInterpretation::not_applicable(&self.source, None);
                skipped.state = state;
                skipped
            }
        };

        debug!(
            rule = %self.source,
            state = ?interpretation.state,
            changes = interpretation.changes.len(),
            "interpreted rule"
        );
        Ok(interpretation)
    }

    fn walk(&self, walk: &mut Walk) -> Result<InterpretationState> {
        let last = self.clauses.len() - 1;
        for (i, clause) in self.clauses.iter().enumerate() {
            match clause {
                ClauseInterpreter::Query(_) if i == last && self.target.is_some() => {
                    if let Some(target) = &self.target {
                        self.assign_targets(target, walk)?;
                    }
                }
                ClauseInterpreter::Query(query) => {
                    let value = query.evaluate(&walk.running)?;
                    if value.is_empty() {
                        return Ok(InterpretationState::NotApplicable);
                    }
                    if !value.is_truthy() {
                        return Ok(InterpretationState::Undetermined);
                    }
                    if let Some(op) = self.expression.operators.get(i) {
                        match op.behavior {
                            Behavior::Consume => {
                                let spent: Vec<&Reference> = query
                                    .references()
                                    .iter()
                                    .filter(|r| !r.is_void() && !walk.running.is_symbolic(r))
                                    .collect();
                                walk.running.clear(spent.iter().copied())?;
                                for r in spent {
                                    walk.roles.insert(r.clone(), Role::Consume);
                                }
                                walk.carry = walk.carry.and(&value);
                            }
                            Behavior::Observe => {
                                for r in query.references() {
                                    walk.roles.entry(r.non_void()).or_insert(Role::Observe);
                                }
                                walk.carry = walk.carry.and(&EntityValue::truthy());
                            }
                        }
                    }
                }
                ClauseInterpreter::Assignment(assignment) => {
                    assignment.evaluate(&mut walk.running)?;
                    walk.roles.insert(assignment.target().non_void(), Role::Target);
                }
                ClauseInterpreter::Scenario(scenario) => {
                    walk.scenarios.extend(scenario.evaluate(&walk.running)?);
                }
            }
        }
        Ok(InterpretationState::Applicable)
    }

    fn assign_targets(&self, target: &TargetInterpreter, walk: &mut Walk) -> Result<()> {
        let value = walk.carry.clean();
        for reference in target.evaluate(&walk.running)? {
            walk.running.change(&reference, value.clone())?;
            walk.roles.insert(reference.non_void(), Role::Target);
        }
        Ok(())
    }
}
