//! The initialization state machine.
//!
//! ```text
//! UNINITIALIZED -> MOUNTING -> MOUNTED -> SYNCING -> READY
//!       |              |                    |
//!       +--------------+--------> FAILED <--+
//! ```
//!
//! `READY` and `FAILED` are terminal.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{InitError, Result};

/// State of the one-shot initialization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// Nothing has happened yet.
    Uninitialized,
    /// Creating the mount point and attaching durable storage.
    Mounting,
    /// Durable storage is attached; no data has been loaded.
    Mounted,
    /// Pulling durable state into the volume.
    Syncing,
    /// The volume is populated and the application has been notified.
    Ready,
    /// Initialization stopped; persisted data is unavailable this session.
    Failed,
}

impl InitState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::Ready | InitState::Failed)
    }

    /// Whether `next` may follow this state.
    pub fn can_advance_to(&self, next: InitState) -> bool {
        use InitState::*;
        matches!(
            (self, next),
            (Uninitialized, Mounting)
                | (Uninitialized, Failed)
                | (Mounting, Mounted)
                | (Mounting, Failed)
                | (Mounted, Syncing)
                | (Syncing, Ready)
                | (Syncing, Failed)
        )
    }
}

impl fmt::Display for InitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitState::Uninitialized => "UNINITIALIZED",
            InitState::Mounting => "MOUNTING",
            InitState::Mounted => "MOUNTED",
            InitState::Syncing => "SYNCING",
            InitState::Ready => "READY",
            InitState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Shared, observable cell holding the current [`InitState`].
///
/// Clones observe the same state.
#[derive(Debug, Clone)]
pub struct StateCell {
    state: Arc<Mutex<InitState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InitState::Uninitialized)),
        }
    }

    /// Get the current state.
    pub fn get(&self) -> InitState {
        *self.lock()
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub(crate) fn advance(&self, next: InitState) -> Result<()> {
        let mut state = self.lock();
        if !state.can_advance_to(next) {
            return Err(InitError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        let from = *state;
        tracing::trace!(%from, to = %next, "init state");
        *state = next;
        Ok(())
    }

    /// Move to `FAILED` unless the sequence already ended.
    pub(crate) fn fail(&self) {
        let mut state = self.lock();
        if !state.is_terminal() {
            *state = InitState::Failed;
        }
    }

    fn lock(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), InitState::Uninitialized);
        for next in [
            InitState::Mounting,
            InitState::Mounted,
            InitState::Syncing,
            InitState::Ready,
        ] {
            cell.advance(next).unwrap();
            assert_eq!(cell.get(), next);
        }
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let cell = StateCell::new();
        cell.advance(InitState::Failed).unwrap();
        let err = cell.advance(InitState::Mounting).unwrap_err();
        assert!(matches!(
            err,
            InitError::InvalidTransition {
                from: InitState::Failed,
                to: InitState::Mounting
            }
        ));

        cell.fail();
        assert_eq!(cell.get(), InitState::Failed);
    }

    #[test]
    fn cannot_skip_mounting() {
        let cell = StateCell::new();
        assert!(cell.advance(InitState::Syncing).is_err());
        assert!(cell.advance(InitState::Ready).is_err());
        assert_eq!(cell.get(), InitState::Uninitialized);
    }

    #[test]
    fn mounted_cannot_fail_directly() {
        assert!(!InitState::Mounted.can_advance_to(InitState::Failed));
        assert!(InitState::Syncing.can_advance_to(InitState::Failed));
    }

    #[test]
    fn fail_does_not_override_ready() {
        let cell = StateCell::new();
        cell.advance(InitState::Mounting).unwrap();
        cell.advance(InitState::Mounted).unwrap();
        cell.advance(InitState::Syncing).unwrap();
        cell.advance(InitState::Ready).unwrap();
        cell.fail();
        assert_eq!(cell.get(), InitState::Ready);
    }

    #[test]
    fn clones_share_state() {
        let cell = StateCell::new();
        let observer = cell.clone();
        cell.advance(InitState::Mounting).unwrap();
        assert_eq!(observer.get(), InitState::Mounting);
    }

    #[test]
    fn display_names() {
        assert_eq!(InitState::Uninitialized.to_string(), "UNINITIALIZED");
        assert_eq!(InitState::Ready.to_string(), "READY");
    }
}
