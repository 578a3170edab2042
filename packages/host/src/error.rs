//! Error types for host facilities.

use thiserror::Error;

use crate::path::{MountPath, PathError};

/// Errors raised by the host filesystem and durable stores.
#[derive(Debug, Error)]
pub enum HostError {
    /// A path failed validation.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The target of a create operation already exists.
    #[error("already exists: {0}")]
    AlreadyExists(MountPath),

    /// No node exists at the path.
    #[error("not found: {0}")]
    NotFound(MountPath),

    /// A directory was expected.
    #[error("not a directory: {0}")]
    NotADirectory(MountPath),

    /// A file was expected.
    #[error("is a directory: {0}")]
    IsADirectory(MountPath),

    /// A volume is already attached at the path.
    #[error("already mounted: {0}")]
    AlreadyMounted(MountPath),

    /// No volume is attached at the path.
    #[error("not mounted: {0}")]
    NotMounted(MountPath),

    /// The durable backing store reported a failure.
    ///
    /// The message is the host-provided detail, displayed verbatim.
    #[error("{message}")]
    Storage { message: String },

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Build a storage error from a host-provided detail.
    pub fn storage(message: impl Into<String>) -> Self {
        HostError::Storage {
            message: message.into(),
        }
    }
}

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
