//! Error types for reflex-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An arithmetic operator met operands it cannot combine.
    ///
    /// Recoverable: the owning rule is marked not applicable for this tick.
    #[error("Type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        op: String,
        lhs: String,
        rhs: String,
    },

    #[error("Division by zero")]
    DivisionByZero,

    /// A structurally guaranteed property did not hold. Never recovered.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl Error {
    /// Whether this error only invalidates the clause that raised it
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. } | Error::DivisionByZero)
    }

    pub(crate) fn type_mismatch(op: impl Into<String>, lhs: impl ToString, rhs: impl ToString) -> Self {
        Error::TypeMismatch {
            op: op.into(),
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(Error::DivisionByZero.is_recoverable());
        assert!(Error::type_mismatch("/", "1", "x").is_recoverable());
        assert!(!Error::InvariantViolation("stack".into()).is_recoverable());
        assert!(!Error::InvalidRule("empty".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::type_mismatch("/", "1", "x");
        assert_eq!(err.to_string(), "Type mismatch: cannot apply '/' to 1 and x");
    }
}
