//! Error types for scoped-config.

use std::fmt;
use std::time::Duration;

/// Result type alias for scoped-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Boxed error produced by a storage backend driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A path, route, scope literal or observer condition is malformed.
    #[error("Not valid: {0}")]
    NotValid(String),

    /// A registry lookup (field, observer type) missed, or no value exists at any scope.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An unregistered validator, modifier or observer type was requested.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A required payload is missing.
    #[error("Empty: {0}")]
    Empty(String),

    /// An integer value lies outside the configured ranges.
    #[error("Value {value} is out of range: {reason}")]
    OutOfRange {
        /// The rejected value
        value: i64,
        /// Which ranges were violated
        reason: String,
    },

    /// A configuration for a validator is itself unusable.
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// A validator or modifier chain stopped at one of its functions.
    #[error("{kind} chain interrupted at #{index} ({name}): {source}")]
    Interrupted {
        /// `validator` or `modifier`
        kind: &'static str,
        /// Position of the failing function within the chain
        index: usize,
        /// Registered name of the failing function
        name: String,
        /// The underlying failure
        #[source]
        source: Box<ConfigError>,
    },

    /// A value was rejected by a validator.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    /// A write targeted a scope the field does not permit.
    #[error("Scope {scope} is not permitted for route {route}")]
    PermissionDenied {
        /// The route of the declared field
        route: String,
        /// The rejected scope
        scope: String,
    },

    /// A storage backend failed.
    #[error("Backend {backend} failed for {path}: {source}")]
    Backend {
        /// Name of the backend
        backend: String,
        /// Fully-qualified path of the entry
        path: String,
        /// Driver error
        #[source]
        source: BoxError,
    },

    /// One backend of a multi backend failed.
    #[error("Backend #{index} failed for {path}: {source}")]
    MultiBackend {
        /// Position of the backend inside the multi backend
        index: usize,
        /// Fully-qualified path of the entry
        path: String,
        /// The backend's error
        #[source]
        source: Box<ConfigError>,
    },

    /// A storage operation did not finish in time.
    #[error("{operation} timed out after {after:?} for {path}")]
    Timeout {
        /// `get` or `set`
        operation: &'static str,
        /// Fully-qualified path of the entry
        path: String,
        /// The configured timeout
        after: Duration,
    },

    /// A storage operation was abandoned after a stop signal.
    #[error("Operation canceled for {0}")]
    Canceled(String),

    /// Failed to load configuration from a file or the environment.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize a payload.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Wrap a driver error of the named backend.
    pub fn backend(
        backend: impl Into<String>,
        path: impl fmt::Display,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            path: path.to_string(),
            source: source.into(),
        }
    }

    /// Returns true for [`ConfigError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for [`ConfigError::NotValid`].
    pub fn is_not_valid(&self) -> bool {
        matches!(self, Self::NotValid(_))
    }

    /// Returns true for [`ConfigError::NotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }

    /// Returns true for [`ConfigError::NotAcceptable`].
    pub fn is_not_acceptable(&self) -> bool {
        matches!(self, Self::NotAcceptable(_))
    }

    /// Returns true for [`ConfigError::Timeout`], also when wrapped by a multi backend.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::MultiBackend { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns true for [`ConfigError::PermissionDenied`].
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Returns the innermost error of `Interrupted` and `MultiBackend` wrappers.
    pub fn root_cause(&self) -> &ConfigError {
        match self {
            Self::Interrupted { source, .. } | Self::MultiBackend { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Validation error for rejected configuration values.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}
