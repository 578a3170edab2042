//! Sync Coordinator: pull durable state into the volume, then notify.

use std::time::Duration;

use persistfs_host::{SyncDirection, SyncReport};
use tracing::{error, info};

use crate::error::{InitError, Result};
use crate::mounter::MountedVolume;
use crate::readiness::ReadinessSignal;
use crate::state::{InitState, StateCell};

/// Issues the single populate request for a mounted volume.
#[derive(Debug, Clone, Default)]
pub struct SyncCoordinator {
    timeout: Option<Duration>,
}

impl SyncCoordinator {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Pull durable state into `volume`.
    ///
    /// Host errors, a dropped completion and an elapsed timeout all come
    /// back as `SyncFailure` carrying the detail.
    pub async fn pull(&self, volume: &MountedVolume) -> Result<SyncReport> {
        let request = volume
            .filesystem()
            .syncfs(volume.path(), SyncDirection::Populate);

        let completed = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(completed) => completed,
                Err(_) => {
                    return Err(InitError::SyncFailure {
                        detail: format!("sync timed out after {}ms", limit.as_millis()),
                    })
                }
            },
            None => request.await,
        };

        completed.map_err(|e| InitError::SyncFailure {
            detail: e.to_string(),
        })
    }

    /// Pull, then fire `readiness` on success.
    ///
    /// The load entry point never runs before the pull completes, and never
    /// runs at all if it fails.
    pub async fn run(
        &self,
        volume: &MountedVolume,
        state: &StateCell,
        readiness: &ReadinessSignal,
    ) -> Result<SyncReport> {
        state.advance(InitState::Syncing)?;

        match self.pull(volume).await {
            Ok(report) => {
                info!(path = %volume.path(), files = report.files, "fs sync to great succ.");
                state.advance(InitState::Ready)?;
                readiness.fire();
                Ok(report)
            }
            Err(err) => {
                let detail = match &err {
                    InitError::SyncFailure { detail } => detail.as_str(),
                    _ => "unknown",
                };
                error!(path = %volume.path(), error = %detail, "error syncing");
                state.fail();
                Err(err)
            }
        }
    }
}
