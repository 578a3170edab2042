//! In-memory filesystem namespace with a mount table.
//!
//! `MemFs` is the application's view of files. Directories with a durable
//! store mounted on them are volumes: `syncfs` moves their contents to and
//! from the store, and `auto_persist` mounts write changes through as they
//! happen.
//!
//! Directories inside a volume are stored as marker keys ending in `/`,
//! so empty directories outlive the process too.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::durable::DurableStore;
use crate::error::{HostError, Result};
use crate::fs::{DirEntry, EntryKind, HostFilesystem, MountOptions, SyncDirection, SyncReport};
use crate::path::MountPath;

enum Node {
    File(Bytes),
    Dir(BTreeMap<String, Node>),
}

type Children = BTreeMap<String, Node>;

struct Mount {
    store: Arc<dyn DurableStore>,
    options: MountOptions,
    /// Held from a local change until its durable write has finished.
    writes: Arc<AsyncMutex<()>>,
}

#[derive(Default)]
struct Namespace {
    root: Children,
    mounts: BTreeMap<MountPath, Mount>,
}

/// A pending write-through to a volume's durable store.
struct WriteThrough {
    store: Arc<dyn DurableStore>,
    key: String,
}

impl Namespace {
    fn node(&self, path: &MountPath) -> Option<&Node> {
        let mut components = path.components();
        let first = components.next()?;
        let mut node = self.root.get(first)?;
        for component in components {
            match node {
                Node::Dir(children) => node = children.get(component)?,
                Node::File(_) => return None,
            }
        }
        Some(node)
    }

    fn is_dir(&self, path: &MountPath) -> bool {
        path.is_root() || matches!(self.node(path), Some(Node::Dir(_)))
    }

    fn dir_mut(&mut self, path: &MountPath) -> Result<&mut Children> {
        let mut dir = &mut self.root;
        for component in path.components() {
            match dir.get_mut(component) {
                Some(Node::Dir(children)) => dir = children,
                Some(Node::File(_)) => return Err(HostError::NotADirectory(path.clone())),
                None => return Err(HostError::NotFound(path.clone())),
            }
        }
        Ok(dir)
    }

    /// Split `path` into its parent directory and final component.
    fn parent_dir_mut<'a>(&mut self, path: &'a MountPath) -> Result<(&mut Children, &'a str)> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(HostError::AlreadyExists(path.clone()));
        };
        Ok((self.dir_mut(&parent)?, name))
    }

    /// The innermost mount containing `path`.
    fn innermost(&self, path: &MountPath) -> Option<(&MountPath, &Mount)> {
        self.mounts
            .iter()
            .filter(|(mount_path, _)| path.has_prefix(mount_path))
            .max_by_key(|(mount_path, _)| mount_path.components().count())
    }

    /// The write-through for `path`, if its mount persists writes.
    fn write_through(&self, path: &MountPath) -> Option<WriteThrough> {
        let (mount_path, mount) = self.innermost(path)?;
        if !mount.options.auto_persist {
            return None;
        }

        Some(WriteThrough {
            store: mount.store.clone(),
            key: path.strip_prefix(mount_path)?,
        })
    }
}

/// Insert a file below `dir`, creating intermediate directories.
///
/// Returns `false` if a file is in the way of a needed directory.
fn place_file(dir: &mut Children, components: &[String], data: Bytes) -> bool {
    match components {
        [] => false,
        [name] => {
            if matches!(dir.get(name), Some(Node::Dir(_))) {
                return false;
            }
            dir.insert(name.clone(), Node::File(data));
            true
        }
        [head, rest @ ..] => {
            let child = dir
                .entry(head.clone())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            match child {
                Node::Dir(children) => place_file(children, rest, data),
                Node::File(_) => false,
            }
        }
    }
}

/// Create a directory below `dir`, including intermediate directories.
///
/// Returns `false` if a file is in the way.
fn place_dir(dir: &mut Children, components: &[String]) -> bool {
    let Some((head, rest)) = components.split_first() else {
        return true;
    };
    let child = dir
        .entry(head.clone())
        .or_insert_with(|| Node::Dir(BTreeMap::new()));
    match child {
        Node::Dir(children) => place_dir(children, rest),
        Node::File(_) => false,
    }
}

fn dir_marker(key: &str) -> String {
    format!("{}/", key)
}

/// Collect every file and directory marker below `dir`.
fn collect_entries(dir: &Children, prefix: &str, out: &mut BTreeMap<String, Bytes>) {
    for (name, node) in dir {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        match node {
            Node::File(data) => {
                out.insert(key, data.clone());
            }
            Node::Dir(children) => {
                out.insert(dir_marker(&key), Bytes::new());
                collect_entries(children, &key, out);
            }
        }
    }
}

fn is_dir_marker(key: &str) -> bool {
    key.ends_with('/')
}

/// An in-memory filesystem namespace.
///
/// Clones share the same namespace, so the host, the initializer and the
/// application can each hold a handle.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use persistfs_host::{HostFilesystem, MemFs, MemoryDurableStore, MountOptions, MountPath};
///
/// let fs = MemFs::new();
/// let path = MountPath::parse("/persist").unwrap();
/// fs.mkdir(&path).unwrap();
/// fs.mount(&path, Arc::new(MemoryDurableStore::new()), MountOptions::default())
///     .unwrap();
/// assert!(fs.is_mounted(&path));
/// ```
#[derive(Clone, Default)]
pub struct MemFs {
    inner: Arc<Mutex<Namespace>>,
}

impl MemFs {
    /// Create an empty namespace containing only `/`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active mounts.
    pub fn mount_count(&self) -> usize {
        self.namespace().mounts.len()
    }

    fn namespace(&self) -> MutexGuard<'_, Namespace> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Order durable writes through the mount containing `path`.
    async fn serialize(&self, path: &MountPath) -> Option<OwnedMutexGuard<()>> {
        let writes = self
            .namespace()
            .innermost(path)
            .map(|(_, mount)| mount.writes.clone());
        match writes {
            Some(writes) => Some(writes.lock_owned().await),
            None => None,
        }
    }

    fn store_for(&self, path: &MountPath) -> Result<Arc<dyn DurableStore>> {
        self.namespace()
            .mounts
            .get(path)
            .map(|mount| mount.store.clone())
            .ok_or_else(|| HostError::NotMounted(path.clone()))
    }

    fn mkdir_local(&self, path: &MountPath) -> Result<Option<WriteThrough>> {
        let mut ns = self.namespace();
        let (dir, name) = ns.parent_dir_mut(path)?;
        if dir.contains_key(name) {
            return Err(HostError::AlreadyExists(path.clone()));
        }
        dir.insert(name.to_string(), Node::Dir(BTreeMap::new()));
        Ok(ns.write_through(path))
    }

    fn write_local(&self, path: &MountPath, data: Bytes) -> Result<Option<WriteThrough>> {
        let mut ns = self.namespace();
        let (dir, name) = ns.parent_dir_mut(path)?;
        if matches!(dir.get(name), Some(Node::Dir(_))) {
            return Err(HostError::IsADirectory(path.clone()));
        }
        dir.insert(name.to_string(), Node::File(data));
        Ok(ns.write_through(path))
    }

    fn remove_local(&self, path: &MountPath) -> Result<Option<WriteThrough>> {
        let mut ns = self.namespace();
        let (dir, name) = ns
            .parent_dir_mut(path)
            .map_err(|_| HostError::NotFound(path.clone()))?;
        match dir.get(name) {
            Some(Node::File(_)) => {}
            Some(Node::Dir(_)) => return Err(HostError::IsADirectory(path.clone())),
            None => return Err(HostError::NotFound(path.clone())),
        }
        dir.remove(name);
        Ok(ns.write_through(path))
    }

    fn replace_volume(&self, path: &MountPath, entries: BTreeMap<String, Bytes>) -> Result<usize> {
        let mut ns = self.namespace();
        let volume = ns.dir_mut(path)?;
        volume.clear();

        let mut files = 0;
        for (key, data) in entries {
            let marker = is_dir_marker(&key);
            let placed = MountPath::split_relative(&key)
                .map(|components| {
                    if marker {
                        !components.is_empty() && place_dir(volume, &components)
                    } else {
                        place_file(volume, &components, data)
                    }
                })
                .unwrap_or(false);
            if placed {
                if !marker {
                    files += 1;
                }
            } else {
                tracing::warn!(volume = %path, key = %key, "skipping unplaceable durable entry");
            }
        }
        Ok(files)
    }

    fn volume_entries(&self, path: &MountPath) -> Result<BTreeMap<String, Bytes>> {
        let mut ns = self.namespace();
        let volume = ns.dir_mut(path)?;
        let mut entries = BTreeMap::new();
        collect_entries(volume, "", &mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl HostFilesystem for MemFs {
    fn mkdir(&self, path: &MountPath) -> Result<()> {
        self.mkdir_local(path).map(|_| ())
    }

    fn mount(
        &self,
        path: &MountPath,
        store: Arc<dyn DurableStore>,
        options: MountOptions,
    ) -> Result<()> {
        let mut ns = self.namespace();
        match ns.node(path) {
            _ if path.is_root() => {}
            Some(Node::Dir(_)) => {}
            Some(Node::File(_)) => return Err(HostError::NotADirectory(path.clone())),
            None => return Err(HostError::NotFound(path.clone())),
        }
        if ns.mounts.contains_key(path) {
            return Err(HostError::AlreadyMounted(path.clone()));
        }

        tracing::debug!(path = %path, auto_persist = options.auto_persist, "attached durable store");
        ns.mounts.insert(
            path.clone(),
            Mount {
                store,
                options,
                writes: Arc::new(AsyncMutex::new(())),
            },
        );
        Ok(())
    }

    fn is_mounted(&self, path: &MountPath) -> bool {
        self.namespace().mounts.contains_key(path)
    }

    fn exists(&self, path: &MountPath) -> bool {
        let ns = self.namespace();
        path.is_root() || ns.node(path).is_some()
    }

    fn read_file(&self, path: &MountPath) -> Result<Bytes> {
        match self.namespace().node(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir(_)) => Err(HostError::IsADirectory(path.clone())),
            None if path.is_root() => Err(HostError::IsADirectory(path.clone())),
            None => Err(HostError::NotFound(path.clone())),
        }
    }

    fn read_dir(&self, path: &MountPath) -> Result<Vec<DirEntry>> {
        let mut ns = self.namespace();
        if !ns.is_dir(path) {
            return match ns.node(path) {
                Some(_) => Err(HostError::NotADirectory(path.clone())),
                None => Err(HostError::NotFound(path.clone())),
            };
        }
        let dir = ns.dir_mut(path)?;
        Ok(dir
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    Node::File(_) => EntryKind::File,
                    Node::Dir(_) => EntryKind::Directory,
                },
            })
            .collect())
    }

    async fn create_dir(&self, path: &MountPath) -> Result<()> {
        let _writes = self.serialize(path).await;
        if let Some(through) = self.mkdir_local(path)? {
            through.store.put(&dir_marker(&through.key), Bytes::new()).await?;
        }
        Ok(())
    }

    async fn write_file(&self, path: &MountPath, data: Bytes) -> Result<()> {
        let _writes = self.serialize(path).await;
        if let Some(through) = self.write_local(path, data.clone())? {
            through.store.put(&through.key, data).await?;
        }
        Ok(())
    }

    async fn remove_file(&self, path: &MountPath) -> Result<()> {
        let _writes = self.serialize(path).await;
        if let Some(through) = self.remove_local(path)? {
            through.store.delete(&through.key).await?;
        }
        Ok(())
    }

    async fn syncfs(&self, path: &MountPath, direction: SyncDirection) -> Result<SyncReport> {
        let store = self.store_for(path)?;
        let _writes = self.serialize(path).await;

        let files = match direction {
            SyncDirection::Populate => {
                let entries = store.load_all().await?;
                self.replace_volume(path, entries)?
            }
            SyncDirection::Persist => {
                let local = self.volume_entries(path)?;
                let stale: Vec<String> = store
                    .load_all()
                    .await?
                    .into_keys()
                    .filter(|key| !local.contains_key(key))
                    .collect();

                for key in &stale {
                    store.delete(key).await?;
                }
                let files = local.keys().filter(|key| !is_dir_marker(key)).count();
                for (key, data) in local {
                    store.put(&key, data).await?;
                }
                files
            }
        };

        tracing::debug!(path = %path, ?direction, files, "sync complete");
        Ok(SyncReport { direction, files })
    }
}
