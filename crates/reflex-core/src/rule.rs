//! Rule expressions and the results of interpreting them

use crate::{ChangeSet, Error, Expr, Reference, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a transition does to the state matched on its left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    /// Spend the matched entities (`->`)
    Consume,
    /// Leave the matched entities in place (`=>`)
    Observe,
}

/// The kind of thing a transition produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[default]
    State,
    Action,
    Trigger,
}

/// An operator joining two clauses of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleOperator {
    pub behavior: Behavior,
    #[serde(default)]
    pub target: TargetKind,
    /// Left-context label attached by the parser, if any
    #[serde(default)]
    pub label: Option<String>,
}

impl RuleOperator {
    pub fn consume() -> Self {
        Self {
            behavior: Behavior::Consume,
            target: TargetKind::State,
            label: None,
        }
    }

    pub fn observe() -> Self {
        Self {
            behavior: Behavior::Observe,
            target: TargetKind::State,
            label: None,
        }
    }

    pub fn with_target(mut self, target: TargetKind) -> Self {
        self.target = target;
        self
    }

    pub fn symbol(&self) -> &'static str {
        match self.behavior {
            Behavior::Consume => "->",
            Behavior::Observe => "=>",
        }
    }
}

/// `target = value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Reference,
    pub value: Expr,
}

/// One clause of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clause {
    /// A guard, or the target selection when terminal
    Query(Expr),
    /// An assignment that always applies
    Action(Assignment),
    /// A weighting expression
    Scenario(Expr),
}

impl Clause {
    pub fn query(e: Expr) -> Self {
        Clause::Query(e)
    }

    pub fn assign(target: &str, value: Expr) -> Self {
        Clause::Action(Assignment {
            target: Reference::new(target),
            value,
        })
    }

    pub fn scenario(e: Expr) -> Self {
        Clause::Scenario(e)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Query(e) => write!(f, "{}", e),
            Clause::Action(a) => write!(f, "{} = {}", a.target, a.value),
            Clause::Scenario(e) => write!(f, "[{}]", e),
        }
    }
}

/// An ordered chain of clauses joined by operators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleExpression {
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub operators: Vec<RuleOperator>,
    /// Source text; the rendered chain when absent
    #[serde(default)]
    pub source: Option<String>,
}

impl RuleExpression {
    /// Build and validate a rule
    pub fn new(clauses: Vec<Clause>, operators: Vec<RuleOperator>) -> Result<Self> {
        let rule = Self {
            clauses,
            operators,
            source: None,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// A chain of query clauses all joined by `->`
    pub fn chain(clauses: Vec<Expr>) -> Result<Self> {
        let operators = vec![RuleOperator::consume(); clauses.len().saturating_sub(1)];
        Self::new(clauses.into_iter().map(Clause::Query).collect(), operators)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.clauses.is_empty() {
            return Err(Error::InvalidRule("rule has no clauses".to_string()));
        }
        if self.operators.len() + 1 != self.clauses.len() {
            return Err(Error::InvalidRule(format!(
                "{} clauses need {} operators, found {}",
                self.clauses.len(),
                self.clauses.len() - 1,
                self.operators.len()
            )));
        }
        Ok(())
    }

    /// The source text identifying this rule
    pub fn source(&self) -> String {
        self.source.clone().unwrap_or_else(|| self.to_string())
    }

    /// Target kind of the terminal operator
    pub fn target_kind(&self) -> TargetKind {
        self.operators.last().map(|op| op.target).unwrap_or_default()
    }
}

impl fmt::Display for RuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, clause) in self.clauses.iter().enumerate() {
            if n > 0 {
                let symbol = self.operators.get(n - 1).map_or("->", RuleOperator::symbol);
                write!(f, " {} ", symbol)?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

/// Outcome of interpreting a rule against a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpretationState {
    Applicable,
    NotApplicable,
    /// A guard only held symbolically
    Undetermined,
}

/// How an interpretation touches a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Consume,
    Observe,
    Target,
}

/// The structured effect of one rule for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInterpretation {
    pub state: InterpretationState,
    pub changes: ChangeSet,
    pub source: String,
    /// Weights from scenario clauses; empty means the default weight
    pub scenarios: Vec<f64>,
    pub roles: IndexMap<Reference, Role>,
    pub target_kind: TargetKind,
    /// Why the rule did not apply, when known
    pub reason: Option<String>,
}

impl RuleInterpretation {
    pub fn not_applicable(source: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            state: InterpretationState::NotApplicable,
            changes: ChangeSet::new(),
            source: source.into(),
            scenarios: Vec::new(),
            roles: IndexMap::new(),
            target_kind: TargetKind::default(),
            reason,
        }
    }

    /// The changed references
    pub fn keys(&self) -> impl Iterator<Item = &Reference> {
        self.changes.keys()
    }

    /// Sum of scenario weights, 1 without any scenario
    pub fn scenario_weight(&self) -> f64 {
        if self.scenarios.is_empty() {
            1.0
        } else {
            self.scenarios.iter().sum()
        }
    }

    pub fn is_applicable(&self) -> bool {
        self.state == InterpretationState::Applicable
    }
}
