//! Draining the registry.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;

use super::Registry;
use crate::error::panic_message;
use crate::key::NormalizedKey;
use crate::traits::{Teardown, TeardownResult, TeardownShape};

/// What happened to one instance during [`Registry::close_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The instance supports no teardown shape
    Skipped,
    /// The selected shape returned `Ok`
    Closed(TeardownShape),
    /// The selected shape returned an error or panicked
    Failed(TeardownShape, String),
    /// The selected shape exceeded the configured deadline
    TimedOut(TeardownShape),
}

impl TeardownOutcome {
    /// Returns true for failed and timed-out attempts.
    pub fn is_failure(&self) -> bool {
        matches!(self, TeardownOutcome::Failed(..) | TeardownOutcome::TimedOut(_))
    }

    /// Shape that was attempted, if any.
    pub fn shape(&self) -> Option<TeardownShape> {
        match self {
            TeardownOutcome::Skipped => None,
            TeardownOutcome::Closed(shape)
            | TeardownOutcome::Failed(shape, _)
            | TeardownOutcome::TimedOut(shape) => Some(*shape),
        }
    }
}

impl Registry {
    /// Tears down every stored instance and resets the registry.
    ///
    /// Waits for constructions in flight to commit, then takes every instance
    /// out of the store and runs its teardown. Attempts run concurrently and
    /// each one is isolated: an error, a panic or an expired deadline is
    /// logged and reported in the returned outcomes, never propagated. The
    /// lock table and in-flight table are cleared afterwards, so the registry
    /// can be used again.
    ///
    /// `create` calls that reach the slow path while the drain runs wait for
    /// it to finish and then construct against the emptied registry. Creates
    /// issued by a factory that is still running are let through, so that
    /// construction can commit and be drained with the rest.
    ///
    /// The drain runs on its own task. Dropping the returned future does not
    /// stop it: every drained instance is still torn down and the registry
    /// still leaves the draining state.
    ///
    /// Returns one outcome per drained instance, sorted by key.
    pub async fn close_all(&self) -> Vec<(NormalizedKey, TeardownOutcome)> {
        let registry = self.clone();
        match tokio::spawn(async move { registry.drain().await }).await {
            Ok(outcomes) => outcomes,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                tracing::warn!("drain task was cancelled by the runtime");
                Vec::new()
            }
        }
    }

    async fn drain(&self) -> Vec<(NormalizedKey, TeardownOutcome)> {
        let _gate = self.inner.gate.write().await;
        let _draining = DrainingFlag::raise(self);

        let running = self.inner.constructions.running();
        if running > 0 {
            tracing::debug!(running, "waiting for constructions in flight");
        }
        self.inner.constructions.wait_idle().await;

        let drained = self.inner.store.drain();
        tracing::info!(instances = drained.len(), "draining registry");

        let deadline = self.inner.config.teardown_timeout;
        let observers = &self.inner.observers;
        let mut outcomes = join_all(drained.into_iter().map(move |(key, built)| async move {
            let outcome = match built.teardown {
                Some(target) => close_instance(&key, target, deadline).await,
                None => TeardownOutcome::Skipped,
            };
            observers.teardown_finished(&key, &outcome);
            (key, outcome)
        }))
        .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        self.inner.locks.clear().await;

        let failures = outcomes.iter().filter(|(_, o)| o.is_failure()).count();
        tracing::info!(closed = outcomes.len(), failures, "registry drained");
        outcomes
    }
}

/// Marks the registry as draining until dropped. Dropping also releases the
/// in-flight table, so an aborted drain leaves no stale state behind.
struct DrainingFlag<'a> {
    registry: &'a Registry,
}

impl<'a> DrainingFlag<'a> {
    fn raise(registry: &'a Registry) -> Self {
        registry.inner.draining.store(true, Ordering::Release);
        DrainingFlag { registry }
    }
}

impl Drop for DrainingFlag<'_> {
    fn drop(&mut self) {
        self.registry.inner.in_flight.clear();
        self.registry.inner.draining.store(false, Ordering::Release);
    }
}

async fn close_instance(
    key: &NormalizedKey,
    target: Arc<dyn Teardown>,
    deadline: Option<Duration>,
) -> TeardownOutcome {
    let Some(shape) = TeardownShape::select(target.shapes()) else {
        return TeardownOutcome::Skipped;
    };

    let attempt = AssertUnwindSafe(run_shape(target.as_ref(), shape)).catch_unwind();
    let result = match deadline {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(key = %key, shape = shape.method_name(), ?limit, "teardown timed out");
                return TeardownOutcome::TimedOut(shape);
            }
        },
        None => attempt.await,
    };

    match result {
        Ok(Ok(())) => {
            tracing::debug!(key = %key, shape = shape.method_name(), "instance closed");
            TeardownOutcome::Closed(shape)
        }
        Ok(Err(err)) => {
            tracing::warn!(key = %key, shape = shape.method_name(), error = %err, "teardown failed");
            TeardownOutcome::Failed(shape, err.to_string())
        }
        Err(payload) => {
            let message = format!("panicked: {}", panic_message(&*payload));
            tracing::warn!(key = %key, shape = shape.method_name(), error = %message, "teardown failed");
            TeardownOutcome::Failed(shape, message)
        }
    }
}

async fn run_shape(target: &dyn Teardown, shape: TeardownShape) -> TeardownResult {
    match shape {
        TeardownShape::AsyncClose => target.aclose().await,
        TeardownShape::AsyncCloseSync => target.aclose_sync(),
        TeardownShape::Close => target.close(),
        TeardownShape::Disconnect => target.disconnect(),
    }
}
