//! Volume Mounter: check capabilities, create the mount point, attach storage.

use std::fmt;
use std::sync::Arc;

use persistfs_host::{Capability, CapabilityRegistry, HostError, HostFilesystem, MountPath};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::VolumeConfig;
use crate::error::{InitError, Result};
use crate::state::{InitState, StateCell};

/// Opaque handle proving a mount point is backed by durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeHandle(Uuid);

impl VolumeHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mount point with durable storage attached and nothing loaded yet.
///
/// Only [`VolumeMounter::mount`] creates one, so holding a `MountedVolume`
/// means mounting succeeded.
#[derive(Clone)]
pub struct MountedVolume {
    path: MountPath,
    filesystem: Arc<dyn HostFilesystem>,
    handle: VolumeHandle,
}

impl MountedVolume {
    pub fn path(&self) -> &MountPath {
        &self.path
    }

    pub fn filesystem(&self) -> &Arc<dyn HostFilesystem> {
        &self.filesystem
    }

    pub fn handle(&self) -> VolumeHandle {
        self.handle
    }
}

impl fmt::Debug for MountedVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedVolume")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Attaches the host's durable storage at the configured mount point.
///
/// Not idempotent: mounting a second time at the same path fails.
pub struct VolumeMounter<'a> {
    registry: &'a dyn CapabilityRegistry,
    config: &'a VolumeConfig,
}

impl<'a> VolumeMounter<'a> {
    pub fn new(registry: &'a dyn CapabilityRegistry, config: &'a VolumeConfig) -> Self {
        Self { registry, config }
    }

    /// Verify capabilities, create the mount point and mount durable storage.
    ///
    /// If either capability is absent nothing is created. Failures are
    /// logged, move `state` to `FAILED` and are never retried.
    pub fn mount(&self, state: &StateCell) -> Result<MountedVolume> {
        if let Some(missing) = self.registry.missing() {
            return Err(self.unavailable(state, missing));
        }
        let filesystem = self
            .registry
            .filesystem()
            .ok_or_else(|| self.unavailable(state, Capability::Filesystem))?;
        let store = self
            .registry
            .durable_storage()
            .ok_or_else(|| self.unavailable(state, Capability::DurableStorage))?;

        state.advance(InitState::Mounting)?;
        let path = self.config.mount_path.clone();
        info!(path = %path, auto_persist = self.config.auto_persist, "mounting");

        let attached = filesystem.mkdir(&path).and_then(|()| {
            filesystem.mount(&path, store, self.config.mount_options())
        });
        if let Err(source) = attached {
            return Err(self.mount_failed(state, path, source));
        }

        state.advance(InitState::Mounted)?;
        Ok(MountedVolume {
            path,
            filesystem,
            handle: VolumeHandle::new(),
        })
    }

    fn unavailable(&self, state: &StateCell, missing: Capability) -> InitError {
        error!(%missing, "FS or IDBFS is not available");
        state.fail();
        InitError::EnvironmentUnavailable { missing }
    }

    fn mount_failed(&self, state: &StateCell, path: MountPath, source: HostError) -> InitError {
        error!(path = %path, error = %source, "mount failed");
        state.fail();
        InitError::Mount { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistfs_host::{HostEnv, MemFs, MemoryDurableStore, Presence};

    fn env_with(fs: &MemFs) -> HostEnv {
        HostEnv::empty()
            .with_filesystem(fs.clone())
            .with_durable_storage(MemoryDurableStore::new())
    }

    #[test]
    fn mounts_at_configured_path() {
        let fs = MemFs::new();
        let env = env_with(&fs);
        let config = VolumeConfig::default();
        let state = StateCell::new();

        let volume = VolumeMounter::new(&env, &config).mount(&state).unwrap();
        assert_eq!(volume.path().to_string(), "/persist");
        assert!(fs.is_mounted(volume.path()));
        assert_eq!(state.get(), InitState::Mounted);
    }

    #[test]
    fn missing_durable_storage_creates_nothing() {
        let fs = MemFs::new();
        let env = env_with(&fs).without_durable_storage();
        let config = VolumeConfig::default();
        let state = StateCell::new();

        let err = VolumeMounter::new(&env, &config).mount(&state).unwrap_err();
        assert!(matches!(
            err,
            InitError::EnvironmentUnavailable {
                missing: Capability::DurableStorage
            }
        ));
        assert!(!fs.exists(&config.mount_path));
        assert_eq!(state.get(), InitState::Failed);
    }

    #[test]
    fn missing_filesystem_reported_first() {
        let env = HostEnv::empty();
        let config = VolumeConfig::default();
        let state = StateCell::new();

        let err = VolumeMounter::new(&env, &config).mount(&state).unwrap_err();
        assert!(matches!(
            err,
            InitError::EnvironmentUnavailable {
                missing: Capability::Filesystem
            }
        ));
    }

    /// A host whose durable storage exists but reports itself absent.
    struct StorageDisabled(HostEnv);

    impl CapabilityRegistry for StorageDisabled {
        fn filesystem(&self) -> Option<Arc<dyn HostFilesystem>> {
            self.0.filesystem()
        }

        fn durable_storage(&self) -> Option<Arc<dyn persistfs_host::DurableStore>> {
            self.0.durable_storage()
        }

        fn query(&self, capability: Capability) -> Presence {
            match capability {
                Capability::Filesystem => Presence::Present,
                Capability::DurableStorage => Presence::Absent,
            }
        }
    }

    #[test]
    fn capability_query_decides_availability() {
        let fs = MemFs::new();
        let env = StorageDisabled(env_with(&fs));
        let config = VolumeConfig::default();
        let state = StateCell::new();

        let err = VolumeMounter::new(&env, &config).mount(&state).unwrap_err();
        assert!(matches!(
            err,
            InitError::EnvironmentUnavailable {
                missing: Capability::DurableStorage
            }
        ));
        assert!(!fs.exists(&config.mount_path));
        assert_eq!(state.get(), InitState::Failed);
    }

    #[test]
    fn second_mount_fails() {
        let fs = MemFs::new();
        let env = env_with(&fs);
        let config = VolumeConfig::default();

        VolumeMounter::new(&env, &config)
            .mount(&StateCell::new())
            .unwrap();

        let state = StateCell::new();
        let err = VolumeMounter::new(&env, &config).mount(&state).unwrap_err();
        assert!(matches!(
            err,
            InitError::Mount {
                source: HostError::AlreadyExists(_),
                ..
            }
        ));
        assert_eq!(state.get(), InitState::Failed);
        assert_eq!(fs.mount_count(), 1);
    }

    #[test]
    fn handles_are_distinct() {
        let fs = MemFs::new();
        let env = env_with(&fs);
        let first = VolumeMounter::new(&env, &VolumeConfig::default())
            .mount(&StateCell::new())
            .unwrap();
        let config = VolumeConfig {
            mount_path: MountPath::parse("/other").unwrap(),
            ..VolumeConfig::default()
        };
        let second = VolumeMounter::new(&env, &config)
            .mount(&StateCell::new())
            .unwrap();
        assert_ne!(first.handle(), second.handle());
    }
}
