//! Test doubles for exercising completion ordering.
//!
//! [`DeferredSyncFs`] behaves like the wrapped [`MemFs`] except that
//! `syncfs` parks until the test decides how the host's completion
//! callback fires. Enable with the `test-utils` feature.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::completion::{self, SyncCompleter};
use crate::durable::DurableStore;
use crate::error::Result;
use crate::fs::{DirEntry, HostFilesystem, MountOptions, SyncDirection, SyncReport};
use crate::memfs::MemFs;
use crate::path::MountPath;

/// A filesystem whose sync requests are resolved by the test.
#[derive(Clone)]
pub struct DeferredSyncFs {
    inner: MemFs,
    requests: mpsc::UnboundedSender<DeferredSync>,
}

/// The test's side of a [`DeferredSyncFs`].
pub struct DeferredSyncs {
    rx: mpsc::UnboundedReceiver<DeferredSync>,
}

/// A sync request waiting for its completion callback.
pub struct DeferredSync {
    fs: MemFs,
    path: MountPath,
    direction: SyncDirection,
    completer: SyncCompleter,
}

impl DeferredSyncFs {
    /// Wrap `inner`, returning the handle used to resolve sync requests.
    pub fn new(inner: MemFs) -> (Self, DeferredSyncs) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner,
                requests: tx,
            },
            DeferredSyncs { rx },
        )
    }
}

impl DeferredSyncs {
    /// Wait for the next sync request.
    pub async fn next(&mut self) -> Option<DeferredSync> {
        self.rx.recv().await
    }

    /// Take a sync request if one has already been issued.
    pub fn try_next(&mut self) -> Option<DeferredSync> {
        self.rx.try_recv().ok()
    }
}

impl DeferredSync {
    pub fn path(&self) -> &MountPath {
        &self.path
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    /// Perform the sync against the wrapped filesystem and deliver its result.
    pub async fn run(self) -> bool {
        let result = self.fs.syncfs(&self.path, self.direction).await;
        self.completer.complete(result)
    }

    /// Deliver a failure without touching the volume.
    pub fn fail(self, detail: impl Into<String>) -> bool {
        self.completer.fail(detail)
    }

    /// Drop the request without ever calling back.
    pub fn abandon(self) {}
}

#[async_trait]
impl HostFilesystem for DeferredSyncFs {
    fn mkdir(&self, path: &MountPath) -> Result<()> {
        self.inner.mkdir(path)
    }

    fn mount(
        &self,
        path: &MountPath,
        store: Arc<dyn DurableStore>,
        options: MountOptions,
    ) -> Result<()> {
        self.inner.mount(path, store, options)
    }

    fn is_mounted(&self, path: &MountPath) -> bool {
        self.inner.is_mounted(path)
    }

    fn exists(&self, path: &MountPath) -> bool {
        self.inner.exists(path)
    }

    fn read_file(&self, path: &MountPath) -> Result<Bytes> {
        self.inner.read_file(path)
    }

    fn read_dir(&self, path: &MountPath) -> Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    async fn create_dir(&self, path: &MountPath) -> Result<()> {
        self.inner.create_dir(path).await
    }

    async fn write_file(&self, path: &MountPath, data: Bytes) -> Result<()> {
        self.inner.write_file(path, data).await
    }

    async fn remove_file(&self, path: &MountPath) -> Result<()> {
        self.inner.remove_file(path).await
    }

    async fn syncfs(&self, path: &MountPath, direction: SyncDirection) -> Result<SyncReport> {
        let (completer, pending) = completion::channel();
        // A closed receiver drops the request, which resolves `pending` to an error.
        let _ = self.requests.send(DeferredSync {
            fs: self.inner.clone(),
            path: path.clone(),
            direction,
            completer,
        });
        pending.await
    }
}
