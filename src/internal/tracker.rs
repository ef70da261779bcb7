//! Count of running construction tasks, so a drain can wait for them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Tracks construction tasks between spawn and commit.
///
/// Each task holds a [`Ticket`] for its whole lifetime. Dropping the last
/// ticket wakes everyone in [`wait_idle`](ConstructionTracker::wait_idle).
#[derive(Default)]
pub(crate) struct ConstructionTracker {
    running: AtomicUsize,
    idle: Notify,
}

/// Proof that one construction is running. Released on drop, including when
/// the runtime aborts the task that owns it.
pub(crate) struct Ticket {
    tracker: Arc<ConstructionTracker>,
}

impl ConstructionTracker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn enter(self: &Arc<Self>) -> Ticket {
        self.running.fetch_add(1, Ordering::AcqRel);
        Ticket {
            tracker: Arc::clone(self),
        }
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Resolves once no construction is running.
    pub(crate) async fn wait_idle(&self) {
        loop {
            // Registered before the check so a release in between is not missed
            let notified = self.idle.notified();
            if self.running() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.tracker.running.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
