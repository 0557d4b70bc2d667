//! Error types for reflex-script

use thiserror::Error;

/// Script loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Core error: {0}")]
    Core(#[from] reflex_core::Error),

    #[error("Engine error: {0}")]
    Hub(#[from] reflex_hub::Error),

    #[error("Duplicate declaration: {0}")]
    DuplicateDeclaration(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
