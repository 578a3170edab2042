//! The initialization context.

use std::sync::Arc;

use persistfs_host::CapabilityRegistry;

use crate::config::VolumeConfig;
use crate::readiness::ReadinessSignal;
use crate::state::StateCell;

/// Everything one initialization run needs, built once at process start.
///
/// The context owns the host registry, the configuration, the state cell
/// and the readiness signal wrapping the application's load entry point.
/// It is moved into an [`Initializer`](crate::Initializer), so a context
/// drives at most one initialization.
pub struct InitContext {
    pub(crate) registry: Arc<dyn CapabilityRegistry>,
    pub(crate) config: VolumeConfig,
    pub(crate) state: StateCell,
    pub(crate) readiness: ReadinessSignal,
}

impl InitContext {
    /// Create a context with the default configuration.
    pub fn new(
        registry: impl CapabilityRegistry + 'static,
        load: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::with_config(registry, VolumeConfig::default(), load)
    }

    pub fn with_config(
        registry: impl CapabilityRegistry + 'static,
        config: VolumeConfig,
        load: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            state: StateCell::new(),
            readiness: ReadinessSignal::new(load),
        }
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// A handle observing this context's state.
    pub fn state(&self) -> StateCell {
        self.state.clone()
    }
}
