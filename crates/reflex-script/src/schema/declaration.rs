//! Reference declarations

use reflex_core::{EntityValue, Reference, Value};
use serde::{Deserialize, Serialize};

/// A declared reference, optionally symbolic or with an initial value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// The reference, with any type tags (`"door<openable>"`)
    pub reference: Reference,
    /// Whether the reference is a free variable
    #[serde(default)]
    pub symbolic: bool,
    /// Initial value; empty leaves the reference inactive
    #[serde(default)]
    pub value: Vec<Value>,
}

impl Declaration {
    pub fn new(reference: Reference) -> Self {
        Self {
            reference,
            symbolic: false,
            value: Vec::new(),
        }
    }

    pub fn symbolic(mut self) -> Self {
        self.symbolic = true;
        self
    }

    pub fn with_value(mut self, value: impl IntoIterator<Item = Value>) -> Self {
        self.value = value.into_iter().collect();
        self
    }

    /// The initial value as an entity, `None` when no value is given
    pub fn initial(&self) -> Option<EntityValue> {
        if self.value.is_empty() {
            None
        } else {
            Some(EntityValue::from_values(self.value.iter().cloned()))
        }
    }
}
