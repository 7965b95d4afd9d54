//! Error types
//!
//! Every failure aborts the whole encode/decode call; nothing is retried and
//! no partial result is returned.

use thiserror::Error;

use crate::registry::TypeReference;

/// Errors raised by `encode`, `decode`, `to_json` and `from_json`.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("No serializable representation for closure {name}: it captures {captures} value(s) from its enclosing scope")]
    UnserializableClosure { name: String, captures: usize },

    #[error("Can't serialize {0}: must be a module-level function")]
    UnserializableCallable(String),

    #[error("Cannot convert {0} to a serializable representation")]
    UnencodableValue(String),

    #[error("Malformed representation: {0}")]
    MalformedRepresentation(String),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input too large: {len} bytes exceeds limit of {max}")]
    InputTooLarge { len: usize, max: usize },
}

/// A type or function reference that cannot be located in the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No module named '{0}'")]
    ModuleNotFound(String),

    #[error("Cannot resolve '{path}': '{segment}' not found")]
    MissingAttribute { path: String, segment: String },

    #[error("'{0}' is a module, not a type or function")]
    IsModule(String),

    #[error("Initialization of module '{module}' failed: {message}")]
    Initialization { module: String, message: String },
}

/// A recovered representation that cannot be turned back into a value.
#[derive(Error, Debug)]
pub enum ReconstructionError {
    #[error("Placeholder '{key}' refers to serialized key {index}, but only {available} were recorded")]
    MissingKey {
        key: String,
        index: usize,
        available: usize,
    },

    #[error("'__class__' must reference a type, found {0}")]
    NotAType(String),

    #[error("{0} does not accept a single positional value")]
    NoValueConstructor(TypeReference),

    #[error("{0} cannot be constructed")]
    NotConstructible(TypeReference),

    #[error("Failed to construct {reference}: {source}")]
    Constructor {
        reference: TypeReference,
        #[source]
        source: ConversionError,
    },
}

/// Conversion failures between [`Value`](crate::Value) and Rust types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value {value} out of range for {target}")]
    OutOfRange { target: &'static str, value: i64 },

    #[error("Value {value} out of range for {target}")]
    FloatOutOfRange { target: &'static str, value: f64 },

    #[error("Expected {expected} elements, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Field names must be strings, got {0} key")]
    NonStringKey(String),

    #[error("Field '{0}': {1}")]
    FieldError(String, Box<ConversionError>),

    #[error("Index {0}: {1}")]
    IndexError(usize, Box<ConversionError>),

    #[error("{0}")]
    Custom(String),
}

/// Failures while registering types and functions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{0}' is already registered")]
    Duplicate(String),

    #[error("Cannot register '{path}': '{segment}' is a function, not a namespace")]
    NotANamespace { path: String, segment: String },

    #[error("Invalid path '{0}'")]
    InvalidPath(String),
}
