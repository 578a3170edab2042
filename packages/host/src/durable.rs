//! The host's asynchronous durable key-value storage facility.
//!
//! Keys are `/`-separated paths relative to the volume root; values are
//! raw file contents.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{HostError, Result};

/// Durable key-value storage that survives process restarts.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Load every persisted entry.
    async fn load_all(&self) -> Result<BTreeMap<String, Bytes>>;

    /// Store a single entry, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Delete an entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<String, Bytes>,
    load_failure: Option<String>,
    write_failure: Option<String>,
}

/// A durable store kept in memory.
///
/// Clones share the same entries, so a test can keep a handle to inspect
/// what was persisted or to seed what will be loaded. Failures can be
/// injected to simulate a host storage engine rejecting requests.
#[derive(Clone, Default)]
pub struct MemoryDurableStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryDurableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Bytes>,
    {
        let store = Self::new();
        store.state().entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        store
    }

    /// Make every subsequent `load_all` fail with `message`.
    pub fn fail_loads_with(&self, message: impl Into<String>) {
        self.state().load_failure = Some(message.into());
    }

    /// Make every subsequent `put`/`delete` fail with `message`.
    pub fn fail_writes_with(&self, message: impl Into<String>) {
        self.state().write_failure = Some(message.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.load_failure = None;
        state.write_failure = None;
    }

    /// Get a persisted value.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.state().entries.get(key).cloned()
    }

    /// Copy of every persisted entry.
    pub fn snapshot(&self) -> BTreeMap<String, Bytes> {
        self.state().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<()> {
        match &self.state().write_failure {
            Some(message) => Err(HostError::storage(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn load_all(&self) -> Result<BTreeMap<String, Bytes>> {
        let state = self.state();
        match &state.load_failure {
            Some(message) => Err(HostError::storage(message.clone())),
            None => Ok(state.entries.clone()),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.check_writable()?;
        self.state().entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.state().entries.remove(key);
        Ok(())
    }
}
