//! Bounded worker pool for CPU-bound analysis jobs.
//!
//! A fixed number of async workers pull jobs from a bounded MPMC queue and
//! run each on tokio's blocking pool. `submit` never waits: a full queue is
//! reported as [`HybridError::QueueFull`] and the caller decides whether to
//! retry. `stop` closes the queue, lets workers drain it within the shutdown
//! timeout, and then cancels a quit token every worker watches.
//!
//! Lifecycle: `Stopped -> Running -> Draining -> Stopped`. A stopped pool can
//! be started again; each run gets fresh channels.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender, TrySendError};
use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerPoolConfig;
use crate::error::{HybridError, Result};

/// Extra wait after a force-stop for workers to observe the quit token.
const FORCE_STOP_GRACE: Duration = Duration::from_millis(500);

/// A unit of work. Long jobs should poll the token and bail out early.
pub type Job<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T> + Send + 'static>;

struct Task<T> {
    id: u64,
    job: Job<T>,
}

/// Outcome of one job, emitted on the results channel.
#[derive(Debug)]
pub struct TaskResult<T> {
    pub task_id: u64,
    pub outcome: Result<T>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Stopped,
    Running,
    Draining,
}

/// Point-in-time counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub state: PoolState,
    pub workers: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub active_workers: usize,
    pub workers_started: u64,
    pub workers_exited: u64,
    pub submitted: u64,
    pub completed: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    started: AtomicU64,
    exited: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
}

/// Counts a worker as active for as long as it lives, even if it panics.
struct WorkerGuard(Arc<Counters>);

impl WorkerGuard {
    fn enter(counters: &Arc<Counters>) -> Self {
        counters.started.fetch_add(1, Ordering::SeqCst);
        counters.active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        self.0.exited.fetch_add(1, Ordering::SeqCst);
    }
}

struct Run<T> {
    state: PoolState,
    tasks: Option<Sender<Task<T>>>,
    results: Option<Receiver<TaskResult<T>>>,
    handles: Vec<JoinHandle<()>>,
    quit: Option<CancellationToken>,
}

pub struct WorkerPool<T> {
    name: &'static str,
    workers: usize,
    queue_capacity: usize,
    shutdown_timeout: Duration,
    run: Mutex<Run<T>>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(name: &'static str, config: &WorkerPoolConfig) -> Self {
        Self::with_settings(
            name,
            config.workers,
            config.queue_capacity,
            config.shutdown_timeout(),
        )
    }

    /// Zero workers or capacity are raised to one.
    pub fn with_settings(
        name: &'static str,
        workers: usize,
        queue_capacity: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            name,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            shutdown_timeout,
            run: Mutex::new(Run {
                state: PoolState::Stopped,
                tasks: None,
                results: None,
                handles: Vec::new(),
                quit: None,
            }),
            next_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn state(&self) -> PoolState {
        self.run.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Spawn the workers. Cancelling `ctx` stops them as a force-stop would.
    pub fn start(&self, ctx: &CancellationToken) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| {
            HybridError::NotInitialized(format!("{}: no tokio runtime available", self.name))
        })?;
        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        if run.state != PoolState::Stopped {
            return Err(HybridError::Other(format!("{}: worker pool already running", self.name)));
        }

        let (task_tx, task_rx) = async_channel::bounded(self.queue_capacity);
        let (result_tx, result_rx) = async_channel::unbounded();
        let quit = ctx.child_token();

        run.handles = (0..self.workers)
            .map(|worker_id| {
                runtime.spawn(worker_loop(
                    self.name,
                    worker_id,
                    task_rx.clone(),
                    result_tx.clone(),
                    quit.clone(),
                    Arc::clone(&self.counters),
                ))
            })
            .collect();
        run.tasks = Some(task_tx);
        run.results = Some(result_rx);
        run.quit = Some(quit);
        run.state = PoolState::Running;

        tracing::debug!(pool = self.name, workers = self.workers, capacity = self.queue_capacity, "Worker pool started");
        Ok(())
    }

    /// Enqueue a job without waiting. Returns the task id.
    pub fn submit<F>(&self, job: F) -> Result<u64>
    where
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        let run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let tx = match (&run.state, &run.tasks) {
            (PoolState::Running, Some(tx)) => tx,
            _ => return Err(HybridError::NotStarted),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(Task { id, job: Box::new(job) }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(id)
            }
            Err(TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(HybridError::QueueFull {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(HybridError::NotStarted),
        }
    }

    /// Results of the current (or most recent) run. The channel closes once
    /// every worker of that run has exited.
    pub fn results(&self) -> Result<Receiver<TaskResult<T>>> {
        let run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        run.results.clone().ok_or(HybridError::NotStarted)
    }

    /// Close the queue and wait for the workers. Jobs still queued are run
    /// unless the shutdown timeout elapses first, in which case the quit
    /// token is cancelled. No-op when already stopped.
    pub async fn stop(&self) {
        let (tasks, handles, quit) = {
            let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
            if run.state != PoolState::Running {
                return;
            }
            run.state = PoolState::Draining;
            (run.tasks.take(), std::mem::take(&mut run.handles), run.quit.take())
        };

        if let Some(tasks) = tasks {
            tasks.close();
        }

        // One join future for both waits: a finished JoinHandle must not be
        // polled again.
        let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();
        let mut joined = std::pin::pin!(join_all(handles));
        let drained = tokio::time::timeout(self.shutdown_timeout, joined.as_mut())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                pool = self.name,
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Worker pool did not drain in time, force-stopping"
            );
            if let Some(quit) = &quit {
                quit.cancel();
            }
            if tokio::time::timeout(FORCE_STOP_GRACE, joined.as_mut())
                .await
                .is_err()
            {
                tracing::warn!(pool = self.name, "Aborting unresponsive workers");
                for handle in &aborts {
                    handle.abort();
                }
            }
        }
        if let Some(quit) = quit {
            quit.cancel();
        }

        let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        run.state = PoolState::Stopped;
        tracing::debug!(pool = self.name, drained, "Worker pool stopped");
    }

    pub fn stats(&self) -> PoolStats {
        let run = self.run.lock().unwrap_or_else(|e| e.into_inner());
        let c = &self.counters;
        PoolStats {
            state: run.state,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            queued: run.tasks.as_ref().map_or(0, |tx| tx.len()),
            active_workers: c.active.load(Ordering::SeqCst),
            workers_started: c.started.load(Ordering::SeqCst),
            workers_exited: c.exited.load(Ordering::SeqCst),
            submitted: c.submitted.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop<T: Send + 'static>(
    pool: &'static str,
    worker_id: usize,
    tasks: Receiver<Task<T>>,
    results: Sender<TaskResult<T>>,
    quit: CancellationToken,
    counters: Arc<Counters>,
) {
    let _guard = WorkerGuard::enter(&counters);
    loop {
        let task = tokio::select! {
            biased;
            _ = quit.cancelled() => break,
            next = tasks.recv() => match next {
                Ok(task) => task,
                // Closed and drained.
                Err(_) => break,
            },
        };

        let started = Instant::now();
        let token = quit.clone();
        let job = task.job;
        let blocking = tokio::task::spawn_blocking(move || job(&token));
        let outcome = tokio::select! {
            biased;
            _ = quit.cancelled() => Err(HybridError::Cancelled),
            joined = blocking => joined.unwrap_or_else(|e| {
                Err(HybridError::Task(format!("task {} failed: {e}", task.id)))
            }),
        };
        counters.completed.fetch_add(1, Ordering::Relaxed);
        let interrupted = quit.is_cancelled();

        // Unbounded; only fails once every receiver is gone.
        let _ = results.try_send(TaskResult {
            task_id: task.id,
            outcome,
            duration: started.elapsed(),
        });
        if interrupted {
            break;
        }
    }
    tracing::trace!(pool, worker_id, "Worker exited");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(workers: usize, capacity: usize) -> WorkerPool<usize> {
        WorkerPool::with_settings("test", workers, capacity, Duration::from_secs(5))
    }

    #[test]
    fn start_without_runtime_fails() {
        let p = pool(2, 4);
        let err = p.start(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, HybridError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn submit_before_start_is_not_started() {
        let p = pool(2, 4);
        assert!(matches!(p.submit(|_| Ok(1)), Err(HybridError::NotStarted)));
        assert!(matches!(p.results(), Err(HybridError::NotStarted)));
    }

    #[tokio::test]
    async fn runs_jobs_and_reports_results() {
        let p = pool(3, 16);
        p.start(&CancellationToken::new()).unwrap();
        let rx = p.results().unwrap();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(p.submit(move |_| Ok(i * 2)).unwrap());
        }
        p.stop().await;

        let mut seen = Vec::new();
        while let Ok(result) = rx.recv().await {
            seen.push((result.task_id, result.outcome.unwrap()));
        }
        seen.sort();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.iter().map(|(id, _)| *id).collect::<Vec<_>>(), ids);
        assert_eq!(seen.iter().map(|(_, v)| *v).sum::<usize>(), 90);
    }

    #[tokio::test]
    async fn job_errors_are_reported_not_dropped() {
        let p = pool(1, 4);
        p.start(&CancellationToken::new()).unwrap();
        let rx = p.results().unwrap();
        p.submit(|_| Err(HybridError::Parse("bad".into()))).unwrap();
        p.stop().await;
        let result = rx.recv().await.unwrap();
        assert!(matches!(result.outcome, Err(HybridError::Parse(_))));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_pool_restarts() {
        let p = pool(2, 4);
        p.stop().await;
        p.start(&CancellationToken::new()).unwrap();
        assert!(p.start(&CancellationToken::new()).is_err());
        p.stop().await;
        p.stop().await;
        assert_eq!(p.state(), PoolState::Stopped);
        assert!(matches!(p.submit(|_| Ok(0)), Err(HybridError::NotStarted)));

        p.start(&CancellationToken::new()).unwrap();
        let rx = p.results().unwrap();
        p.submit(|_| Ok(7)).unwrap();
        p.stop().await;
        assert_eq!(rx.recv().await.unwrap().outcome.unwrap(), 7);
        let stats = p.stats();
        assert_eq!(stats.workers_started, 4);
        assert_eq!(stats.workers_exited, 4);
        assert_eq!(stats.active_workers, 0);
    }

    #[tokio::test]
    async fn overflow_is_rejected_without_blocking() {
        let p = pool(1, 3);
        p.start(&CancellationToken::new()).unwrap();
        // current-thread runtime: workers cannot run until we yield
        let outcomes: Vec<_> = (0..6).map(|i| p.submit(move |_| Ok(i))).collect();
        let full = outcomes
            .iter()
            .filter(|r| matches!(r, Err(HybridError::QueueFull { capacity: 3 })))
            .count();
        assert_eq!(full, 3);
        assert_eq!(p.stats().rejected, 3);
        p.stop().await;
        assert_eq!(p.stats().completed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn force_stop_cancels_slow_jobs() {
        let p = WorkerPool::with_settings("slow", 1, 4, Duration::from_millis(50));
        p.start(&CancellationToken::new()).unwrap();
        let rx = p.results().unwrap();
        p.submit(|token: &CancellationToken| {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !token.is_cancelled() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(1usize)
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        p.stop().await;
        assert!(started.elapsed() < Duration::from_secs(2));

        let result = rx.recv().await.unwrap();
        assert!(matches!(result.outcome, Err(HybridError::Cancelled)));
        assert!(rx.recv().await.is_err(), "no results after stop");
        assert_eq!(p.stats().active_workers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn force_stop_with_an_idle_worker_does_not_repoll() {
        let p = WorkerPool::with_settings("mixed", 2, 4, Duration::from_millis(50));
        p.start(&CancellationToken::new()).unwrap();
        let rx = p.results().unwrap();
        p.submit(|token: &CancellationToken| {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(0usize)
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The idle worker exits during the first wait, the busy one only
        // after the quit token fires.
        p.stop().await;
        let result = rx.recv().await.unwrap();
        assert!(matches!(result.outcome, Err(HybridError::Cancelled)));
        let stats = p.stats();
        assert_eq!(stats.state, PoolState::Stopped);
        assert_eq!(stats.workers_exited, 2);
        assert_eq!(stats.active_workers, 0);
    }

    #[tokio::test]
    async fn parent_cancellation_stops_workers() {
        let parent = CancellationToken::new();
        let p = pool(2, 4);
        p.start(&parent).unwrap();
        let rx = p.results().unwrap();
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while rx.recv().await.is_ok() {}
        })
        .await
        .expect("results channel should close");
        assert_eq!(p.stats().active_workers, 0);
        p.stop().await;
    }
}
