//! Supervised background tasks.
//!
//! A [`BackgroundTask`] owns a cancellation token and the join handle of a
//! spawned tokio task. Stopping cancels the token and awaits the handle;
//! repeated stops are no-ops and a task that already exited is fine.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{HybridError, Result};

pub struct BackgroundTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawn `make(token)` on the current tokio runtime. The future should
    /// return once the token is cancelled.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, make: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| {
            HybridError::NotInitialized(format!("{name}: no tokio runtime available"))
        })?;
        let cancel = parent.child_token();
        let handle = runtime.spawn(make(cancel.clone()));
        tracing::debug!(task = name, "Background task started");
        Ok(Self {
            name,
            cancel,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Run `tick` every `period` until cancelled. The first tick fires after
    /// one full period.
    pub fn spawn_periodic<F>(
        name: &'static str,
        parent: &CancellationToken,
        period: Duration,
        mut tick: F,
    ) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(name, parent, move |cancel| async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => tick(),
                }
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        let guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the task to finish. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = {
            let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!(task = self.name, "Background task panicked");
                }
            }
            tracing::debug!(task = self.name, "Background task stopped");
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawn_without_runtime_is_not_initialized() {
        let token = CancellationToken::new();
        let result = BackgroundTask::spawn("orphan", &token, |_| async {});
        assert!(matches!(result, Err(HybridError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let token = CancellationToken::new();
        let task = BackgroundTask::spawn("idle", &token, |cancel| async move {
            cancel.cancelled().await;
        })
        .unwrap();
        assert!(task.is_running());
        task.stop().await;
        assert!(!task.is_running());
        task.stop().await;
    }

    #[tokio::test]
    async fn stop_after_task_exited_does_not_hang() {
        let token = CancellationToken::new();
        let task = BackgroundTask::spawn("short", &token, |_| async {}).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.stop().await;
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_task() {
        let parent = CancellationToken::new();
        let task = BackgroundTask::spawn("child", &parent, |cancel| async move {
            cancel.cancelled().await;
        })
        .unwrap();
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), task.stop())
            .await
            .expect("stop should return promptly");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let token = CancellationToken::new();
        let task = BackgroundTask::spawn_periodic("ticker", &token, Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(35)).await;
        task.stop().await;
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected at least 3 ticks, got {seen}");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
