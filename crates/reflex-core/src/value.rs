//! Scalar literal values carried inside entity values

use crate::{ArithOp, CmpOp, Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A concrete literal value
///
/// Numbers are stored as `f64` and compared with a total order, so values can
/// be used as members of ordered sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value; `true` doubles as the truthy sentinel
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// String value
    String(String),
}

/// Total order over floats with `-0.0` folded into `0.0`
pub(crate) fn cmp_f64(a: f64, b: f64) -> Ordering {
    normalize(a).total_cmp(&normalize(b))
}

pub(crate) fn normalize(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl Value {
    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }

    /// The `false` literal, which never survives as an entity member
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    /// Apply an arithmetic operator to two literals
    pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                let (a, b) = (*a, *b);
                let n = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => {
                        if b == 0.0 {
                            return Err(Error::DivisionByZero);
                        }
                        a / b
                    }
                    ArithOp::Pow => a.powf(b),
                };
                Ok(Value::Number(normalize(n)))
            }
            (Value::String(a), Value::String(b)) if op == ArithOp::Add => {
                Ok(Value::String(format!("{}{}", a, b)))
            }
            _ => Err(Error::type_mismatch(
                op.symbol(),
                lhs.type_name(),
                rhs.type_name(),
            )),
        }
    }

    /// Compare two literals.
    ///
    /// Returns `None` when the pair is not comparable under `op` (ordering
    /// across different types, or ordering of booleans).
    pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Option<bool> {
        let ordering = match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => cmp_f64(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) if !op.is_ordering() => a.cmp(b),
            _ if !op.is_ordering() => {
                return Some(op == CmpOp::Ne);
            }
            _ => return None,
        };
        Some(op.holds(ordering))
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => cmp_f64(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => normalize(*n).to_bits().hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Number(i as f64)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Number(i as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(normalize(f))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
