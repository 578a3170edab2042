//! Concrete host environments.

use std::path::PathBuf;
use std::sync::Arc;

use crate::capability::CapabilityRegistry;
use crate::durable::{DurableStore, MemoryDurableStore};
use crate::error::Result;
use crate::fs::HostFilesystem;
use crate::local_disk::LocalDiskDurableStore;
use crate::memfs::MemFs;

/// A host environment: the facilities it provides, each optional.
///
/// # Example
///
/// ```rust
/// use persistfs_host::{Capability, CapabilityRegistry, HostEnv, Presence};
///
/// let env = HostEnv::in_memory().without_durable_storage();
/// assert_eq!(env.query(Capability::Filesystem), Presence::Present);
/// assert_eq!(env.missing(), Some(Capability::DurableStorage));
/// ```
#[derive(Clone, Default)]
pub struct HostEnv {
    filesystem: Option<Arc<dyn HostFilesystem>>,
    durable: Option<Arc<dyn DurableStore>>,
}

impl HostEnv {
    /// A host that provides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// An in-memory filesystem over an in-memory durable store.
    pub fn in_memory() -> Self {
        Self::empty()
            .with_filesystem(MemFs::new())
            .with_durable_storage(MemoryDurableStore::new())
    }

    /// An in-memory filesystem over a durable store rooted at `root` on disk.
    pub fn local_disk(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::empty()
            .with_filesystem(MemFs::new())
            .with_durable_storage(LocalDiskDurableStore::new(root)?))
    }

    pub fn with_filesystem(mut self, filesystem: impl HostFilesystem + 'static) -> Self {
        self.filesystem = Some(Arc::new(filesystem));
        self
    }

    pub fn with_durable_storage(mut self, store: impl DurableStore + 'static) -> Self {
        self.durable = Some(Arc::new(store));
        self
    }

    pub fn without_filesystem(mut self) -> Self {
        self.filesystem = None;
        self
    }

    pub fn without_durable_storage(mut self) -> Self {
        self.durable = None;
        self
    }
}

impl CapabilityRegistry for HostEnv {
    fn filesystem(&self) -> Option<Arc<dyn HostFilesystem>> {
        self.filesystem.clone()
    }

    fn durable_storage(&self) -> Option<Arc<dyn DurableStore>> {
        self.durable.clone()
    }
}
