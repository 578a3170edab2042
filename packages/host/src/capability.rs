//! Capability discovery.
//!
//! A host either provides a facility or it does not. Callers ask the
//! registry once, at startup, instead of probing for facilities ad hoc.

use std::fmt;
use std::sync::Arc;

use crate::durable::DurableStore;
use crate::fs::HostFilesystem;

/// A facility the host may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// The generic filesystem facility.
    Filesystem,
    /// The asynchronous durable key-value storage facility.
    DurableStorage,
}

impl Capability {
    /// Every capability, in the order they are checked.
    pub const ALL: [Capability; 2] = [Capability::Filesystem, Capability::DurableStorage];

    /// The fixed host-side name of the facility.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Filesystem => "FS",
            Capability::DurableStorage => "IDBFS",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present)
    }
}

/// The registry of facilities a host provides.
pub trait CapabilityRegistry: Send + Sync {
    /// The filesystem facility, if present.
    fn filesystem(&self) -> Option<Arc<dyn HostFilesystem>>;

    /// The durable storage facility, if present.
    fn durable_storage(&self) -> Option<Arc<dyn DurableStore>>;

    /// Check whether a capability is present.
    fn query(&self, capability: Capability) -> Presence {
        let present = match capability {
            Capability::Filesystem => self.filesystem().is_some(),
            Capability::DurableStorage => self.durable_storage().is_some(),
        };
        if present {
            Presence::Present
        } else {
            Presence::Absent
        }
    }

    /// The first absent capability, if any.
    fn missing(&self) -> Option<Capability> {
        Capability::ALL
            .into_iter()
            .find(|capability| !self.query(*capability).is_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::MemoryDurableStore;

    struct DurableOnly;

    impl CapabilityRegistry for DurableOnly {
        fn filesystem(&self) -> Option<Arc<dyn HostFilesystem>> {
            None
        }

        fn durable_storage(&self) -> Option<Arc<dyn DurableStore>> {
            Some(Arc::new(MemoryDurableStore::new()))
        }
    }

    #[test]
    fn capability_names() {
        assert_eq!(Capability::Filesystem.to_string(), "FS");
        assert_eq!(Capability::DurableStorage.to_string(), "IDBFS");
    }

    #[test]
    fn default_query_follows_facilities() {
        let registry = DurableOnly;
        assert_eq!(registry.query(Capability::Filesystem), Presence::Absent);
        assert_eq!(registry.query(Capability::DurableStorage), Presence::Present);
        assert_eq!(registry.missing(), Some(Capability::Filesystem));
    }
}
