//! Reflex Script - RON program loader
//!
//! Loads a rule program from RON files:
//! - Reference declarations (type tags, symbolic variables, initial values)
//! - Rule expressions as clause chains
//! - An initial context block and an optional engine configuration
//!
//! [`Program::into_engine`] turns the result into a ready [`reflex_hub::Engine`].

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::{Loader, Program};
pub use schema::{Declaration, ProgramFile};
