//! Error types shared across the crate.

use thiserror::Error;

/// Errors returned by variable GET/SET.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
    /// No variable with this alias in the built-in or application table
    #[error("variable not found: {0}")]
    NotFound(String),

    /// The value failed type, range or length validation
    #[error("invalid value for '{alias}': {reason}")]
    InvalidArgument {
        /// Alias of the variable being written
        alias: String,
        /// Human readable reason, suitable for a form message
        reason: String,
    },

    /// The value does not fit the fixed-capacity storage behind the variable
    #[error("value for '{alias}' exceeds storage capacity of {capacity} bytes")]
    Overflow {
        /// Alias of the variable being written
        alias: String,
        /// Capacity of the backing buffer in bytes
        capacity: usize,
    },
}

impl VarError {
    pub(crate) fn invalid(alias: &str, reason: impl Into<String>) -> Self {
        VarError::InvalidArgument {
            alias: alias.to_string(),
            reason: reason.into(),
        }
    }

    /// Short code reported by the REST API.
    ///
    /// Capacity overflow is an invalid argument from the client's point of view.
    pub fn code(&self) -> &'static str {
        match self {
            VarError::NotFound(_) => "NOT_FOUND",
            VarError::InvalidArgument { .. } | VarError::Overflow { .. } => "INVALID_ARG",
        }
    }

    /// HTTP status used when the error is surfaced through the REST API.
    pub fn http_status(&self) -> u16 {
        match self {
            VarError::NotFound(_) => 404,
            VarError::InvalidArgument { .. } | VarError::Overflow { .. } => 400,
        }
    }
}

/// A write did not fit into a fixed-capacity string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity of {capacity} bytes exceeded")]
pub struct Overflow {
    /// Capacity of the destination in bytes
    pub capacity: usize,
}

/// Errors from configuration persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed (flash, NVS, ...)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Stored blob does not start with the configuration magic
    #[error("stored configuration is not recognised")]
    BadMagic,

    /// Stored blob was written by an incompatible layout version
    #[error("stored configuration version {found} is not supported (expected {expected})")]
    Version {
        /// Version found in the blob header
        found: u16,
        /// Version this build reads and writes
        expected: u16,
    },

    /// Blob body could not be encoded or decoded
    #[error("configuration codec error: {0}")]
    Codec(#[from] bincode::Error),
}
