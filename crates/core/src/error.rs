//! Error types for tessera
//!
//! Every fallible operation in the workspace returns [`TesseraResult`].
//! The variants form a small taxonomy so callers can branch on the kind of
//! failure without parsing messages:
//!
//! - `Validation`: malformed arguments (names, buffers, keys, duplicates)
//! - `InvalidState`: the handle is in the wrong lifecycle state or mode
//! - `Conflict`: the consistency controller refused a registration
//! - `Evolution`: a schema change could not be applied
//! - `Serialization`: a binary record could not be encoded or decoded
//! - `RemoteUnsupported`: the operation has no remote implementation
//! - `NotFound`: a named entity does not exist
//! - `Storage`: the directory collaborator failed
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for tessera operations
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;

/// Error type shared by all tessera crates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TesseraError {
    /// An argument failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Operation is not valid in the current lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state violation
        message: String,
    },

    /// Concurrent open refused by the consistency controller
    #[error("Conflict on '{uri}': {message}")]
    Conflict {
        /// Array URI the conflict occurred on
        uri: String,
        /// Reason for the refusal
        message: String,
    },

    /// Schema evolution failed
    #[error("Schema evolution error: {message}")]
    Evolution {
        /// Why the change could not be applied
        message: String,
    },

    /// Encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Codec failure detail
        message: String,
    },

    /// Operation not available for remote arrays
    #[error("Remote arrays do not support {operation}")]
    RemoteUnsupported {
        /// Name of the rejected operation
        operation: String,
    },

    /// A named entity does not exist
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing entity
        what: String,
    },

    /// Directory or storage collaborator failure
    #[error("Storage error: {message}")]
    Storage {
        /// Failure detail
        message: String,
    },
}

impl TesseraError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        TesseraError::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        TesseraError::InvalidState {
            message: message.into(),
        }
    }

    /// Create a conflict error for `uri`
    pub fn conflict(uri: impl Into<String>, message: impl Into<String>) -> Self {
        TesseraError::Conflict {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create an evolution error
    pub fn evolution(message: impl Into<String>) -> Self {
        TesseraError::Evolution {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        TesseraError::Serialization {
            message: message.into(),
        }
    }

    /// Create a remote-unsupported error for the named operation
    pub fn remote_unsupported(operation: impl Into<String>) -> Self {
        TesseraError::RemoteUnsupported {
            operation: operation.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        TesseraError::NotFound { what: what.into() }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        TesseraError::Storage {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Stable machine-readable code for this error kind
    pub fn error_code(&self) -> &'static str {
        match self {
            TesseraError::Validation { .. } => "VALIDATION",
            TesseraError::InvalidState { .. } => "INVALID_STATE",
            TesseraError::Conflict { .. } => "CONFLICT",
            TesseraError::Evolution { .. } => "EVOLUTION",
            TesseraError::Serialization { .. } => "SERIALIZATION",
            TesseraError::RemoteUnsupported { .. } => "REMOTE_UNSUPPORTED",
            TesseraError::NotFound { .. } => "NOT_FOUND",
            TesseraError::Storage { .. } => "STORAGE",
        }
    }

    /// True if this error came from the consistency controller
    pub fn is_conflict(&self) -> bool {
        matches!(self, TesseraError::Conflict { .. })
    }
}

impl From<bincode::Error> for TesseraError {
    fn from(e: bincode::Error) -> Self {
        TesseraError::serialization(e.to_string())
    }
}
