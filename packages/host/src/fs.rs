//! The filesystem facility a host exposes to the application.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::durable::DurableStore;
use crate::error::Result;
use crate::path::MountPath;

/// Options applied when attaching a durable store at a mount point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    /// Write file changes through to the durable store as they happen,
    /// so the application never has to flush explicitly.
    pub auto_persist: bool,
}

/// Direction of a sync between a mounted volume and its durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Replace the volume contents with the durable snapshot.
    Populate,
    /// Write the volume contents to the durable store.
    Persist,
}

/// Summary of a completed sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    /// Number of files transferred.
    pub files: usize,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry returned by [`HostFilesystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// The host's generic filesystem facility.
///
/// Namespace operations (`mkdir`, `mount`) are synchronous: they only touch
/// host-internal structures. Anything that may reach the durable backing
/// store is async, and writes through one mount reach its store in the
/// order they were made.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn HostFilesystem>`.
#[async_trait]
pub trait HostFilesystem: Send + Sync {
    /// Create a single directory in the namespace. The parent must exist.
    ///
    /// The directory reaches durable storage only with the next
    /// `syncfs(Persist)`; use [`create_dir`](Self::create_dir) inside an
    /// auto-persist volume.
    fn mkdir(&self, path: &MountPath) -> Result<()>;

    /// Attach a durable store at an existing directory.
    ///
    /// Mounting twice at the same path fails with `AlreadyMounted`.
    fn mount(
        &self,
        path: &MountPath,
        store: Arc<dyn DurableStore>,
        options: MountOptions,
    ) -> Result<()>;

    /// Check whether a durable store is attached exactly at `path`.
    fn is_mounted(&self, path: &MountPath) -> bool;

    /// Check whether any node exists at `path`.
    fn exists(&self, path: &MountPath) -> bool;

    /// Read the contents of a file.
    fn read_file(&self, path: &MountPath) -> Result<Bytes>;

    /// List a directory, sorted by name.
    fn read_dir(&self, path: &MountPath) -> Result<Vec<DirEntry>>;

    /// Create a single directory, writing it through an auto-persist mount.
    async fn create_dir(&self, path: &MountPath) -> Result<()>;

    /// Create or replace a file. The parent directory must exist.
    async fn write_file(&self, path: &MountPath, data: Bytes) -> Result<()>;

    /// Remove a file.
    async fn remove_file(&self, path: &MountPath) -> Result<()>;

    /// Synchronize the volume mounted at `path` with its durable store.
    ///
    /// Completes exactly once, after the durable store has finished.
    async fn syncfs(&self, path: &MountPath, direction: SyncDirection) -> Result<SyncReport>;
}
