//! Bridge for hosts that report sync completion through a callback.
//!
//! The host hands the [`SyncCompleter`] to whatever invokes its completion
//! callback and awaits the paired [`SyncPending`]. `complete` consumes the
//! completer, so a result can be delivered at most once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{HostError, Result};
use crate::fs::SyncReport;

/// Create a connected completer/pending pair.
pub fn channel() -> (SyncCompleter, SyncPending) {
    let (tx, rx) = oneshot::channel();
    (SyncCompleter { tx }, SyncPending { rx })
}

/// The sending half, owned by the host's completion callback.
#[derive(Debug)]
pub struct SyncCompleter {
    tx: oneshot::Sender<Result<SyncReport>>,
}

impl SyncCompleter {
    /// Deliver the outcome of the sync.
    ///
    /// Returns `false` if nobody is waiting any more.
    pub fn complete(self, result: Result<SyncReport>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Deliver a failure carrying the host's error detail.
    pub fn fail(self, detail: impl Into<String>) -> bool {
        self.complete(Err(HostError::storage(detail)))
    }
}

/// The receiving half; resolves once the host completes the sync.
///
/// If the completer is dropped without a result, resolves to a storage
/// error rather than hanging.
#[derive(Debug)]
pub struct SyncPending {
    rx: oneshot::Receiver<Result<SyncReport>>,
}

impl Future for SyncPending {
    type Output = Result<SyncReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(HostError::storage(
                "sync completion dropped without a result",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::SyncDirection;

    #[tokio::test]
    async fn delivers_success() {
        let (completer, pending) = channel();
        let report = SyncReport {
            direction: SyncDirection::Populate,
            files: 4,
        };
        assert!(completer.complete(Ok(report)));
        assert_eq!(pending.await.unwrap(), report);
    }

    #[tokio::test]
    async fn delivers_failure_detail() {
        let (completer, pending) = channel();
        completer.fail("quota exceeded");
        assert_eq!(pending.await.unwrap_err().to_string(), "quota exceeded");
    }

    #[tokio::test]
    async fn dropped_completer_resolves_to_error() {
        let (completer, pending) = channel();
        drop(completer);
        let err = pending.await.unwrap_err();
        assert!(err.to_string().contains("dropped"));
    }

    #[test]
    fn complete_after_receiver_gone() {
        let (completer, pending) = channel();
        drop(pending);
        assert!(!completer.fail("late"));
    }
}
