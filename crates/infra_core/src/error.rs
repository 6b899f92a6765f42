//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error raised by a provisioning adapter; opaque to the core.
pub type AdapterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while identifying, linking or provisioning units.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Identifier {part} must not be empty")]
    EmptyIdentifierPart { part: &'static str },

    #[error("Kind '{kind}' contains the identifier delimiter '{delimiter}'")]
    DelimiterInKind { kind: String, delimiter: char },

    #[error("Identifier {part} '{value}' contains the scope separator '/'")]
    ScopeSeparatorInIdentifier { part: &'static str, value: String },

    #[error("Identifier '{identifier}' is {length} characters, limit is {limit}")]
    IdentifierTooLong {
        identifier: String,
        length: usize,
        limit: usize,
    },

    #[error("Identifier collision: '{path}' is already declared")]
    IdentifierCollision { path: String },

    #[error("Unknown provisioning unit: {0}")]
    UnknownUnit(String),

    #[error("Cyclic dependency: '{to}' already precedes '{from}', cannot order '{from}' before '{to}'")]
    CyclicDependency { from: String, to: String },

    #[error("Unit '{0}' has already been ordered and can no longer be linked")]
    UnitAlreadyOrdered(String),

    #[error("Provisioning failed for '{unit}': {source}")]
    Provisioning {
        unit: String,
        #[source]
        source: AdapterError,
    },

    #[error("Invalid account context: {0}")]
    InvalidAccount(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
