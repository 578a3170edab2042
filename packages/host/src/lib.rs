//! # persistfs-host
//!
//! The host side of persistfs: the facilities an application's host
//! environment provides, modelled explicitly so the mount/sync protocol
//! can run against any of them.
//!
//! - `MountPath`: validated absolute path in the logical namespace
//! - `HostFilesystem`: the generic filesystem facility (mkdir, mount, syncfs, file I/O)
//! - `DurableStore`: the asynchronous durable key-value storage facility
//! - `CapabilityRegistry`: present/absent queries over both facilities
//! - `HostEnv`: a registry assembled from concrete facilities
//!
//! ## Implementations
//!
//! | Facility          | Types                                               |
//! |-------------------|-----------------------------------------------------|
//! | filesystem        | [`MemFs`]                                           |
//! | durable storage   | [`MemoryDurableStore`], [`LocalDiskDurableStore`]   |
//!
//! ## Example
//!
//! ```rust
//! use persistfs_host::{CapabilityRegistry, HostEnv};
//!
//! let env = HostEnv::in_memory();
//! assert!(env.missing().is_none());
//! ```

mod capability;
pub mod completion;
mod durable;
mod env;
mod error;
mod fs;
mod local_disk;
mod memfs;
mod path;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use capability::{Capability, CapabilityRegistry, Presence};
pub use durable::{DurableStore, MemoryDurableStore};
pub use env::HostEnv;
pub use error::{HostError, Result};
pub use fs::{DirEntry, EntryKind, HostFilesystem, MountOptions, SyncDirection, SyncReport};
pub use local_disk::LocalDiskDurableStore;
pub use memfs::MemFs;
pub use path::{MountPath, PathError};

pub use bytes::Bytes;
