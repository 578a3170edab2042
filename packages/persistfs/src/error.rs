//! Error types for volume initialization.

use std::path::PathBuf;

use persistfs_host::{Capability, HostError, MountPath};
use thiserror::Error;

use crate::state::InitState;

/// Errors that end the initialization sequence.
///
/// Every variant is terminal: it is logged where it happens and the
/// sequence stops, leaving the application without persisted state.
#[derive(Debug, Error)]
pub enum InitError {
    /// The host lacks the filesystem or durable storage facility.
    #[error("environment unavailable: {missing} is not provided by the host")]
    EnvironmentUnavailable { missing: Capability },

    /// The host rejected creating or mounting the volume.
    #[error("mount of {path} failed: {source}")]
    Mount {
        path: MountPath,
        #[source]
        source: HostError,
    },

    /// Pulling durable state into the volume failed.
    #[error("sync failed: {detail}")]
    SyncFailure { detail: String },

    /// The sequence was driven out of order.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: InitState, to: InitState },

    /// The background task driving the sequence stopped abnormally.
    #[error("initialization interrupted: {message}")]
    Interrupted { message: String },
}

/// Errors loading a [`VolumeConfig`](crate::VolumeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for initialization.
pub type Result<T> = std::result::Result<T, InitError>;
