//! # persistfs
//!
//! Bring a durable storage volume online before the application reads it.
//!
//! Startup runs a one-shot pipeline against the host:
//!
//! 1. **Mount** ([`VolumeMounter`]): check that the host provides both the
//!    filesystem and the durable storage capability, create the mount point
//!    and attach durable storage with auto-persist.
//! 2. **Sync** ([`SyncCoordinator`]): issue a single request populating the
//!    volume from durable storage.
//! 3. **Notify** ([`ReadinessSignal`]): on success, invoke the application's
//!    load entry point exactly once. On failure, log and stop; the
//!    application starts without persisted state.
//!
//! ```text
//! UNINITIALIZED -> MOUNTING -> MOUNTED -> SYNCING -> READY
//!                                                 \-> FAILED
//! ```
//!
//! ## Example
//!
//! ```rust
//! use persistfs::{InitContext, Initializer};
//! use persistfs_host::HostEnv;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = InitContext::new(HostEnv::in_memory(), || {
//!     // read saved state from /persist here
//! });
//! let handle = Initializer::new(ctx).start();
//! handle.wait().await.unwrap();
//! # }
//! ```

mod config;
mod context;
mod coordinator;
mod error;
mod init;
mod mounter;
mod readiness;
mod state;

pub use config::{VolumeConfig, DEFAULT_MOUNT_PATH};
pub use context::InitContext;
pub use coordinator::SyncCoordinator;
pub use error::{ConfigError, InitError, Result};
pub use init::{InitHandle, Initializer};
pub use mounter::{MountedVolume, VolumeHandle, VolumeMounter};
pub use readiness::{LoadEntryPoint, ReadinessSignal};
pub use state::{InitState, StateCell};
