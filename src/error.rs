//! Error taxonomy of query/retrieve operations

use thiserror::Error;

use dimse::DimseError;

/// Result type alias for operation setup
pub type Result<T> = std::result::Result<T, OpError>;

/// Failures seen by the orchestrators.
///
/// Only `InvalidArgument` is ever returned to callers directly; every other
/// variant ends up as the error detail of an [`OperationResult`](crate::OperationResult).
#[derive(Error, Debug)]
pub enum OpError {
    /// Required node or output location missing
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be resolved or the client could not be built
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Association or protocol failure reported by the transport
    #[error(transparent)]
    Dimse(#[from] DimseError),

    /// The accepted storage-class table could not be fully loaded
    #[error("Storage class table error: {0}")]
    StorageClasses(String),
}

/// Errors raised while loading or validating [`AdvancedParams`](crate::AdvancedParams)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl OpError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Underlying transport error, if any
    pub fn as_dimse(&self) -> Option<&DimseError> {
        match self {
            OpError::Dimse(e) => Some(e),
            _ => None,
        }
    }
}
