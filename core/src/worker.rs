//! Bounded worker pool for background jobs.
//!
//! The pool owns a fixed set of worker tasks draining one shared job queue.
//! The queue is bounded; when full, the oldest queued job is discarded to
//! admit the newest. Callers that need stronger guarantees should size the
//! queue so overflow never happens in practice.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Tuning for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks. Values below one are treated as one.
    ///
    /// Default: 1; a single worker keeps job execution ordered.
    pub workers: usize,

    /// Maximum queued jobs before the oldest is discarded.
    ///
    /// Default: 64.
    pub capacity: usize,
}

impl WorkerPoolConfig {
    /// Create the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            workers: 1,
            capacity: 64,
        }
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the queue capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    jobs: Mutex<VecDeque<BoxFuture<'static, ()>>>,
    capacity: usize,
    notify: Notify,
}

impl Shared {
    fn pop(&self) -> Option<BoxFuture<'static, ()>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

/// Fixed-size pool of worker tasks sharing one bounded job queue.
///
/// Jobs run to completion on whichever worker dequeues them first, in
/// submission order when a single worker is configured.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Start a pool with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, because worker tasks are
    /// spawned immediately.
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::new()),
            capacity: config.capacity.max(1),
            notify: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|index| {
                tokio::spawn(worker_loop(
                    Arc::clone(&shared),
                    shutdown_rx.clone(),
                    index,
                ))
            })
            .collect();

        Self {
            shared,
            handles: Mutex::new(handles),
            shutdown_tx,
        }
    }

    /// Queue a job for execution.
    ///
    /// If the queue is at capacity the oldest queued job is dropped to make
    /// room; running jobs are never interrupted.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut jobs = self
                .shared
                .jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if jobs.len() >= self.shared.capacity {
                jobs.pop_front();
                metrics::counter!("seckill_worker_jobs_discarded_total").increment(1);
                tracing::warn!(
                    capacity = self.shared.capacity,
                    "worker queue full, discarded oldest job"
                );
            }
            jobs.push_back(Box::pin(job));
        }
        self.shared.notify.notify_one();
    }

    /// Number of jobs waiting to be picked up by a worker.
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.shared
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stop the pool after draining already-queued jobs.
    ///
    /// Jobs submitted after this call may never run.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = {
            let mut guard = self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>, index: usize) {
    tracing::debug!(worker = index, "worker started");
    loop {
        if let Some(job) = shared.pop() {
            job.await;
            continue;
        }
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shared.notify.notified() => {},
            _ = shutdown.changed() => {},
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn config_defaults_and_builder() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.capacity, 64);

        let config = WorkerPoolConfig::new().with_workers(4).with_capacity(8);
        assert_eq!(config.workers, 4);
        assert_eq!(config.capacity, 8);
    }

    #[tokio::test]
    async fn runs_submitted_jobs() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_until(|| counter.load(Ordering::SeqCst) == 5).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn overflow_discards_oldest_job() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_workers(1).with_capacity(2));
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();
        let ran = Arc::new(Mutex::new(Vec::new()));

        pool.submit(async move {
            let _ = gate_rx.await;
        });
        // The worker must be parked on the gate before the queue fills.
        wait_until(|| pool.queued_jobs() == 0).await;

        for name in ["a", "b", "c"] {
            let ran = Arc::clone(&ran);
            pool.submit(async move {
                ran.lock().unwrap().push(name);
            });
        }
        assert_eq!(pool.queued_jobs(), 2);

        gate_tx.send(()).unwrap();
        wait_until(|| ran.lock().unwrap().len() == 2).await;
        pool.shutdown().await;

        let ran = ran.lock().unwrap().clone();
        assert_eq!(ran, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(WorkerPoolConfig::new().with_workers(1).with_capacity(16));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
