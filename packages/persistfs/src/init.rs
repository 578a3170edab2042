//! The one-shot initialization sequence: mount, sync, notify.

use persistfs_host::SyncReport;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::error;

use crate::context::InitContext;
use crate::coordinator::SyncCoordinator;
use crate::error::{InitError, Result};
use crate::mounter::{MountedVolume, VolumeMounter};
use crate::state::{InitState, StateCell};

/// Drives one [`InitContext`] through mount, sync and notify.
///
/// `run` and `start` consume the initializer, so a context can only ever
/// be initialized once.
///
/// # Example
///
/// ```rust
/// use persistfs::{InitContext, Initializer, InitState};
/// use persistfs_host::HostEnv;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = InitContext::new(HostEnv::in_memory(), || println!("load"));
/// let init = Initializer::new(ctx);
/// let state = init.state();
///
/// init.run().await.unwrap();
/// assert_eq!(state.get(), InitState::Ready);
/// # }
/// ```
pub struct Initializer {
    context: InitContext,
}

impl Initializer {
    pub fn new(context: InitContext) -> Self {
        Self { context }
    }

    /// A handle observing the sequence's state.
    pub fn state(&self) -> StateCell {
        self.context.state()
    }

    /// Mount, sync and notify, returning once the sequence has ended.
    ///
    /// Failures are already logged when this returns `Err`; callers may
    /// ignore the error and carry on without persisted state.
    pub async fn run(self) -> Result<SyncReport> {
        let volume = self.mount()?;
        self.sync(volume).await
    }

    /// Mount synchronously, then continue the sequence on the runtime.
    ///
    /// Returns as soon as the sync request is handed off; the load entry
    /// point runs later from the spawned task. Outside a tokio runtime
    /// nothing is mounted and the handle reports `Interrupted`.
    pub fn start(self) -> InitHandle {
        let state = self.state();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "no async runtime to run the sync on");
                state.fail();
                return InitHandle {
                    state,
                    volume: None,
                    task: InitTask::Finished(Err(InitError::Interrupted {
                        message: e.to_string(),
                    })),
                };
            }
        };

        let volume = match self.mount() {
            Ok(volume) => volume,
            Err(err) => {
                return InitHandle {
                    state,
                    volume: None,
                    task: InitTask::Finished(Err(err)),
                }
            }
        };

        let spawned = volume.clone();
        let task = runtime.spawn(async move { self.sync(spawned).await });
        InitHandle {
            state,
            volume: Some(volume),
            task: InitTask::Running(task),
        }
    }

    fn mount(&self) -> Result<MountedVolume> {
        let ctx = &self.context;
        VolumeMounter::new(ctx.registry.as_ref(), &ctx.config).mount(&ctx.state)
    }

    async fn sync(self, volume: MountedVolume) -> Result<SyncReport> {
        let ctx = self.context;
        SyncCoordinator::new(ctx.config.sync_timeout())
            .run(&volume, &ctx.state, &ctx.readiness)
            .await
    }
}

enum InitTask {
    Finished(Result<SyncReport>),
    Running(JoinHandle<Result<SyncReport>>),
}

/// Handle to a sequence started with [`Initializer::start`].
pub struct InitHandle {
    state: StateCell,
    volume: Option<MountedVolume>,
    task: InitTask,
}

impl InitHandle {
    /// Current state of the sequence.
    pub fn state(&self) -> InitState {
        self.state.get()
    }

    /// The mounted volume, if mounting succeeded.
    pub fn volume(&self) -> Option<&MountedVolume> {
        self.volume.as_ref()
    }

    /// Wait for the sequence to end.
    pub async fn wait(self) -> Result<SyncReport> {
        match self.task {
            InitTask::Finished(result) => result,
            InitTask::Running(task) => match task.await {
                Ok(result) => result,
                Err(join) => {
                    self.state.fail();
                    Err(InitError::Interrupted {
                        message: join.to_string(),
                    })
                }
            },
        }
    }
}

impl std::fmt::Debug for InitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitHandle")
            .field("state", &self.state.get())
            .field("volume", &self.volume)
            .finish()
    }
}
