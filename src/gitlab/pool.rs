// src/gitlab/pool.rs
// =============================================================================
// A fixed-width worker pool.
//
// Every stage of the walk owns one of these: pagination, the per-project stage
// and the per-file stage inside each project. `submit` never blocks. Each task
// is spawned straight away and waits for one of `width` semaphore permits
// before doing any work, so at most `width` tasks of a pool run at a time no
// matter how many are queued.
//
// Cancellation is cooperative. The shared token is checked before every
// submission and again when a queued task gets its permit; once it fires no
// new work starts, while tasks that already started run to completion.
//
// `join` is the pool's blocking join: it returns only after every submitted
// task has finished.
// =============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct WorkerPool {
    name: &'static str,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    skipped: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// A width of zero is treated as one.
    pub fn new(name: &'static str, width: usize, cancel: CancellationToken) -> Self {
        Self {
            name,
            permits: Arc::new(Semaphore::new(width.max(1))),
            cancel,
            handles: Vec::new(),
            skipped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues one task. Returns `false` if cancellation already fired.
    pub fn submit<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();
        let skipped = Arc::clone(&self.skipped);

        self.handles.push(tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if cancel.is_cancelled() {
                skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }

            task.await;
        }));

        true
    }

    /// Waits for every submitted task. Returns how many tasks never ran
    /// because of cancellation.
    pub async fn join(self) -> usize {
        let submitted = self.handles.len();

        for result in join_all(self.handles).await {
            if let Err(e) = result {
                tracing::warn!(pool = self.name, error = %e, "worker task panicked");
            }
        }

        let skipped = self.skipped.load(Ordering::Relaxed);
        if skipped > 0 {
            tracing::info!(pool = self.name, submitted, skipped, "cancelled before all work started");
        } else {
            tracing::debug!(pool = self.name, submitted, "pool drained");
        }

        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_every_task() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("test", 3, CancellationToken::new());

        for _ in 0..10 {
            let done = Arc::clone(&done);
            assert!(pool.submit(async move {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(pool.join().await, 0);
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("test", 2, CancellationToken::new());

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        pool.join().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancelled_pool_refuses_new_work() {
        let cancel = CancellationToken::new();
        let mut pool = WorkerPool::new("test", 1, cancel.clone());
        cancel.cancel();

        assert!(!pool.submit(async {}));
        assert!(!pool.submit(async {}));
        assert_eq!(pool.join().await, 2);
    }

    #[tokio::test]
    async fn test_queued_tasks_skip_after_cancel_but_running_task_finishes() {
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("test", 1, cancel.clone());

        for _ in 0..3 {
            let cancel = cancel.clone();
            let finished = Arc::clone(&finished);
            pool.submit(async move {
                // The first task to run cancels the walk, then keeps going.
                cancel.cancel();
                tokio::time::sleep(Duration::from_millis(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(pool.join().await, 2);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_siblings() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new("test", 2, CancellationToken::new());

        pool.submit(async { panic!("boom") });
        for _ in 0..3 {
            let done = Arc::clone(&done);
            pool.submit(async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.join().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
