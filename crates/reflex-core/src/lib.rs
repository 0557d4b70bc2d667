//! Reflex Core - hierarchical state and rule interpretation
//!
//! This crate provides the deterministic building blocks of the reflex engine:
//! - Hierarchical references (`Reference`) and scalar literals (`Value`)
//! - The symbolic multi-valued algebra (`EntityValue`) with its interval solver
//! - The copy-on-write context tree (`EngineContext`) and its diffs
//! - Expression plans, clause interpreters and the rule interpreter
//! - A seedable RNG for reproducible conflict resolution
//!
//! ## Layering
//!
//! `reflex-core` is standalone: it interprets one rule against one context
//! snapshot. Choosing which interpretations commit, history and ticking live
//! in `reflex-hub`.

mod changes;
mod context;
mod entity;
mod error;
mod expr;
pub mod interpreter;
mod interval;
mod ops;
mod reference;
mod rng;
pub mod rule;
mod symbolic;
mod value;

pub use changes::{Change, ChangeSet, Delta};
pub use context::{ContextNode, EngineContext};
pub use entity::{EntityValue, Member};
pub use error::{Error, Result};
pub use expr::{EvalMode, Expr, Plan, Step};
pub use interpreter::{
    AssignmentInterpreter, ClauseInterpreter, QueryInterpreter, RuleInterpreter, ScenarioInterpreter,
    TargetInterpreter,
};
pub use interval::{Interval, IntervalSet};
pub use ops::{ArithOp, CmpOp, LogicOp, UnaryOp};
pub use reference::{Degree, Reference, VOID_SEGMENT};
pub use rng::Rng;
pub use rule::{
    Assignment, Behavior, Clause, InterpretationState, Role, RuleExpression, RuleInterpretation,
    RuleOperator, TargetKind,
};
pub use symbolic::{Constraint, SymExpr};
pub use value::Value;
