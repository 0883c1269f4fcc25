//! Error types for the persondir core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Aggregation errors
// ---------------------------------------------------------------------------

/// Errors raised by the resolver, the rule engine, and the person directory.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// A required configuration value is absent or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation cannot run against the current configuration.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An attribute source failed and the failure was not recovered.
    #[error("attribute source '{source_name}' failed: {cause}")]
    SourceFailure {
        source_name: String,
        #[source]
        cause: SourceError,
    },
}

impl AttributeError {
    /// Name of the source that triggered this error, if any.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            AttributeError::SourceFailure { source_name, .. } => Some(source_name),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors an attribute source may signal from `query` or
/// `possible_attribute_names`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something that could not be interpreted.
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// Generic I/O wrapper.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A nested resolver used as a source failed.
    #[error("nested resolver error: {0}")]
    Resolver(#[source] Box<AttributeError>),
}

impl SourceError {
    /// True when a nested resolver reported a configuration error
    /// (`InvalidArgument` or `InvalidState`) at any depth. Such errors are
    /// never recovered.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            SourceError::Resolver(inner) => match inner.as_ref() {
                AttributeError::InvalidArgument(_) | AttributeError::InvalidState(_) => true,
                AttributeError::SourceFailure { cause, .. } => cause.is_configuration_error(),
            },
            _ => false,
        }
    }
}

impl From<AttributeError> for SourceError {
    fn from(err: AttributeError) -> Self {
        SourceError::Resolver(Box::new(err))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration and backing-file loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or backing file not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("parse error in '{path}': {detail}")]
    ParseError { path: String, detail: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading a file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
