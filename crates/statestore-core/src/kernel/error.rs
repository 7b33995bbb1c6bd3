//! # Statestore Kernel Errors
//!
//! Defines the crate-wide error type.
//!
//! [`Error`] wraps the typed storage system errors, failures reported by the
//! component container while building custom storages, and problems raised
//! while tearing registered components down.
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Crate-wide error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error reported by a component container while constructing an instance.
    #[error("Component container error during '{operation}' for '{name}': {message}")]
    Container {
        operation: String, // e.g., "construct_storage", "construct_splitter"
        name: String,
        message: String,
    },

    /// Error occurring during a specific lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in a component's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Build an I/O error carrying the failing operation and path.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    pub fn container(
        operation: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Container {
            operation: operation.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the storage system error if this is one.
    pub fn as_storage_error(&self) -> Option<&StorageSystemError> {
        match self {
            Error::StorageSystem(err) => Some(err),
            _ => None,
        }
    }
}
