//! A durable store backed by a directory on the local disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use tokio::fs;
use uuid::Uuid;

use crate::durable::DurableStore;
use crate::error::{HostError, Result};

/// Longest encoded name used for a single path component on disk.
const SEGMENT_LEN: usize = 128;

/// Suffix marking a directory that continues an encoded key.
const SEGMENT_DIR_SUFFIX: char = '~';

/// A durable store that keeps one file per key under a root directory.
///
/// Keys are encoded with URL-safe base64, so keys with `/` in them stay
/// flat on disk. Encodings longer than 128 characters are split across
/// nested `~`-suffixed directories to stay under file name limits.
/// Writes go to a uniquely named hidden file in the root first and are
/// renamed into place.
#[derive(Debug, Clone)]
pub struct LocalDiskDurableStore {
    root: PathBuf,
}

impl LocalDiskDurableStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let attr = std::fs::metadata(&root)?;
        if !attr.is_dir() {
            return Err(HostError::Io(io::Error::other(format!(
                "durable store root {} must be a directory",
                root.display()
            ))));
        }

        if attr.permissions().readonly() {
            return Err(HostError::Io(io::Error::other(format!(
                "durable store root {} must be writable",
                root.display()
            ))));
        }

        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// The directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(HostError::storage("durable store keys must not be empty"));
        }

        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        let mut path = self.root.clone();
        let mut rest = encoded.as_str();
        while rest.len() > SEGMENT_LEN {
            let (segment, tail) = rest.split_at(SEGMENT_LEN);
            path.push(format!("{}{}", segment, SEGMENT_DIR_SUFFIX));
            rest = tail;
        }
        path.push(rest);
        Ok(path)
    }

    fn decode_key(encoded: &str) -> Option<String> {
        let raw = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(raw).ok()
    }
}

#[async_trait]
impl DurableStore for LocalDiskDurableStore {
    async fn load_all(&self) -> Result<BTreeMap<String, Bytes>> {
        let mut entries = BTreeMap::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir_path, prefix)) = pending.pop() {
            let mut dir = fs::read_dir(&dir_path).await?;
            while let Some(entry) = dir.next_entry().await? {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }

                if entry.file_type().await?.is_dir() {
                    if let Some(segment) = name.strip_suffix(SEGMENT_DIR_SUFFIX) {
                        pending.push((entry.path(), format!("{}{}", prefix, segment)));
                    }
                    continue;
                }

                let Some(key) = Self::decode_key(&format!("{}{}", prefix, name)) else {
                    tracing::debug!(file = name, "skipping foreign file in durable store");
                    continue;
                };

                tracing::debug!("Reading {}...", entry.path().display());
                let data = fs::read(entry.path()).await?;
                entries.insert(key, Bytes::from(data));
            }
        }

        Ok(entries)
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let target = self.entry_path(key)?;
        if let Some(parent) = target.parent() {
            if parent != self.root {
                fs::create_dir_all(parent).await?;
            }
        }

        let staging = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        tracing::debug!("Writing {}...", target.display());
        fs::write(&staging, &value).await?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
