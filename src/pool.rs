//! Execution pools for recovery bodies
//!
//! Recovery bodies block on file I/O, so the production pool is tokio's
//! blocking pool. `ManualPool` queues tasks until a driver runs them, which
//! lets callers observe the state between scheduling and execution.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::{Handle, TryCurrentError};

/// Fire-and-forget unit of work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted tasks asynchronously.
pub trait ExecutionPool: Send + Sync {
    fn submit(&self, task: Task);
}

/// Runs tasks on the blocking pool of a tokio runtime.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    handle: Handle,
}

impl BlockingPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running in.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl ExecutionPool for BlockingPool {
    fn submit(&self, task: Task) {
        // Result is delivered through the task itself.
        drop(self.handle.spawn_blocking(task));
    }
}

/// Holds tasks until `run_next`/`run_all` is called.
#[derive(Default)]
pub struct ManualPool {
    queue: Mutex<VecDeque<Task>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Runs the oldest queued task. Returns false when the queue is empty.
    pub fn run_next(&self) -> bool {
        // Pop before running so a task may submit more work.
        let task = self.queue().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs queued tasks until the queue is empty. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl ExecutionPool for ManualPool {
    fn submit(&self, task: Task) {
        self.queue().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_manual_pool_defers_until_run() {
        let pool = ManualPool::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(pool.pending(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert!(pool.run_next());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert_eq!(pool.run_all(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!pool.run_next());
    }

    #[test]
    fn test_blocking_pool_requires_runtime() {
        assert!(BlockingPool::current().is_err());
    }

    #[tokio::test]
    async fn test_blocking_pool_runs_task() {
        let pool = BlockingPool::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        pool.submit(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));

        let worker = rx.await.unwrap();
        assert_ne!(worker, std::thread::current().id());
    }
}
