//! Schema definitions for RON programs

pub mod declaration;

pub use declaration::Declaration;

use indexmap::IndexMap;
use reflex_core::{Reference, RuleExpression, Value};
use reflex_hub::EngineConfig;
use serde::{Deserialize, Serialize};

/// The top-level shape of a program file
///
/// ```ron
/// (
///     declarations: [
///         (reference: "house.door<openable>"),
///         (reference: "budget", symbolic: true),
///     ],
///     rules: [
///         (clauses: [Query(Ref("knock")), Query(Ref("house.door"))], operators: [(behavior: Consume)]),
///     ],
///     context: {
///         "knock": [Bool(true)],
///     },
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramFile {
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub rules: Vec<RuleExpression>,
    /// Initial values, merged after declaration values
    #[serde(default)]
    pub context: IndexMap<Reference, Vec<Value>>,
    #[serde(default)]
    pub config: Option<EngineConfig>,
}
