//! Bounded-concurrency executor with most-recent-first dispatch.
//!
//! Under a fast scroll the newest requests are the ones still on screen, so
//! the backlog is drained as a stack, not a queue. A plain FIFO here would
//! render long since-scrolled-past rows before visible ones.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct PoolShared {
    stack: Mutex<Vec<Job>>,
    /// One permit per stacked job; closed at shutdown so idle workers wake
    /// and exit instead of sleeping on a lost notification.
    available: Semaphore,
}

impl std::fmt::Debug for PoolShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolShared")
            .field("closed", &self.available.is_closed())
            .finish_non_exhaustive()
    }
}

/// Fixed-size pool of async workers draining a LIFO job stack.
///
/// Once a worker dequeues a job it runs to completion; there is no
/// cancellation. Jobs still stacked at shutdown are dropped.
#[derive(Debug)]
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks. The count is fixed for the pool's
    /// lifetime.
    pub fn new(workers: usize) -> Self {
        let shared = Arc::new(PoolShared {
            stack: Mutex::new(Vec::new()),
            available: Semaphore::new(0),
        });

        let workers = workers.max(1);
        let handles = (0..workers)
            .map(|index| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    worker_loop(index, shared).await;
                })
            })
            .collect();

        debug!(workers, "render worker pool started");
        Self {
            shared,
            workers: Mutex::new(handles),
        }
    }

    /// Push a job onto the stack. The most recently submitted job is the next
    /// one dispatched. Submissions after shutdown are discarded.
    pub fn submit(&self, job: impl Future<Output = ()> + Send + 'static) {
        if self.shared.available.is_closed() {
            trace!("job submitted after shutdown, discarding");
            return;
        }
        {
            let mut stack = self.shared.stack.lock().expect("job stack poisoned");
            stack.push(Box::pin(job));
            trace!(depth = stack.len(), "job submitted");
        }
        self.shared.available.add_permits(1);
    }

    /// Stop the workers after their current job and wait for them to exit.
    /// Jobs still stacked are dropped. Idempotent.
    pub async fn shutdown(&self) {
        self.shared.available.close();

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().expect("worker list poisoned");
            std::mem::take(&mut *workers)
        };
        for handle in handles {
            let _ = handle.await;
        }

        self.shared.stack.lock().expect("job stack poisoned").clear();
    }
}

async fn worker_loop(index: usize, shared: Arc<PoolShared>) {
    loop {
        // A closed semaphore fails every acquire, even with permits left:
        // the backlog is deliberately abandoned at shutdown.
        let permit = match shared.available.acquire().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        permit.forget();

        let job = {
            let mut stack = shared.stack.lock().expect("job stack poisoned");
            stack.pop()
        };

        if let Some(job) = job {
            trace!(worker = index, "job dequeued");
            job.await;
        }
    }
    trace!(worker = index, "worker exiting");
}
