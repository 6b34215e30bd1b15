//! Progress Channel: single-slot hand-off of `(phase, progress, message)`
//! tuples from a running workflow to whoever mirrors them into the registry.

use crewflow_core::ProgressUpdate;
use tokio::sync::watch;

/// Anything the orchestrator can report progress into.
///
/// Reporting must not block and must not fail.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Create a connected sender/receiver pair seeded with the initial tuple.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = watch::channel(ProgressUpdate::initial());
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Writer half. Only the latest value is retained.
#[derive(Debug)]
pub struct ProgressSender {
    tx: watch::Sender<ProgressUpdate>,
}

impl ProgressSender {
    /// A sender with no consumer attached; updates are dropped.
    pub fn detached() -> Self {
        channel().0
    }

    pub fn latest(&self) -> ProgressUpdate {
        self.tx.borrow().clone()
    }
}

impl ProgressSink for ProgressSender {
    fn report(&self, update: ProgressUpdate) {
        // send_replace succeeds even when every receiver is gone
        self.tx.send_replace(update);
    }
}

/// Reader half.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: watch::Receiver<ProgressUpdate>,
}

impl ProgressReceiver {
    /// Wait for the next unseen tuple.
    ///
    /// Intermediate tuples may be coalesced. Returns `None` once the sender is
    /// dropped and the last value has been observed.
    pub async fn next(&mut self) -> Option<ProgressUpdate> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
