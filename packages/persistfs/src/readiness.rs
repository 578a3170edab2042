//! The one-shot readiness signal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// The application's load entry point.
pub type LoadEntryPoint = Box<dyn FnOnce() + Send + 'static>;

/// Fires the application's load entry point at most once.
///
/// Further calls to [`fire`](Self::fire) are no-ops, however many sync
/// completions are delivered.
pub struct ReadinessSignal {
    load: Mutex<Option<LoadEntryPoint>>,
    fired: AtomicBool,
}

impl ReadinessSignal {
    pub fn new(load: impl FnOnce() + Send + 'static) -> Self {
        Self {
            load: Mutex::new(Some(Box::new(load))),
            fired: AtomicBool::new(false),
        }
    }

    /// Invoke the load entry point if it has not run yet.
    ///
    /// Returns `true` only for the call that actually invoked it.
    pub fn fire(&self) -> bool {
        let load = self
            .load
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match load {
            Some(load) => {
                self.fired.store(true, Ordering::SeqCst);
                load();
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ReadinessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessSignal")
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn fires_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let signal = ReadinessSignal::new({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!signal.has_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(!signal.fire());
        assert!(signal.has_fired());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_fires_invoke_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let signal = Arc::new(ReadinessSignal::new({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                std::thread::spawn(move || signal.fire())
            })
            .collect();
        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
