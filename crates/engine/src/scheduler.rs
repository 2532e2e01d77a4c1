//! Deferred task scheduling.
//!
//! The coordinator defers tally re-evaluations and reminder notifications
//! to fixed offsets after an edit's creation. Delivery is at-least-once: a
//! task may fire more than once, or be retried by an external scheduler
//! after a crash. Every submitted task body must therefore be safely
//! re-runnable; the coordinator's bodies re-fetch current state and
//! no-op when the edit is already finalized.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use lorebase_core::types::Timestamp;

/// A boxed task body submitted to a [`Scheduler`].
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Collaborator that runs a task at (or after) a requested time.
///
/// Implementations are free to deliver late or more than once; callers rely
/// only on "at least once, not before `run_at`".
pub trait Scheduler: Send + Sync {
    /// Submit a task to run at `run_at`. A `run_at` in the past means "run
    /// as soon as possible".
    fn submit(&self, run_at: Timestamp, task: TaskFuture);
}

/// In-process scheduler backed by `tokio::spawn` and `tokio::time::sleep`.
///
/// Tasks still sleeping when the [`CancellationToken`] fires are dropped
/// without running; this is the graceful-shutdown path, not a correctness
/// mechanism, since finalized edits already make stale tasks no-ops.
pub struct TokioScheduler {
    cancel: CancellationToken,
}

impl TokioScheduler {
    /// Create a scheduler whose pending tasks stop when `cancel` fires.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, run_at: Timestamp, task: TaskFuture) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let delay = (run_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Scheduled task dropped during shutdown");
                }
                _ = tokio::time::sleep(delay) => task.await,
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn past_due_task_runs_promptly() {
        let scheduler = TokioScheduler::new(CancellationToken::new());
        let (tx, rx) = oneshot::channel();

        scheduler.submit(
            Utc::now() - chrono::Duration::seconds(5),
            Box::pin(async move {
                let _ = tx.send(());
            }),
        );

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("task did not run in time")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_task_never_runs() {
        let cancel = CancellationToken::new();
        let scheduler = TokioScheduler::new(cancel.clone());
        let (tx, rx) = oneshot::channel::<()>();

        scheduler.submit(
            Utc::now() + chrono::Duration::days(1),
            Box::pin(async move {
                let _ = tx.send(());
            }),
        );
        cancel.cancel();

        // The sender side is dropped without sending once the task is
        // discarded by the cancelled select arm.
        let result = tokio::time::timeout(Duration::from_secs(1), rx).await;
        assert!(matches!(result, Ok(Err(_))));
    }
}
