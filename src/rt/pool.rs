//! The default worker pool.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Executor, Task};

const THREAD_NAME: &str = "courier-dispatcher";
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// A worker pool that grows on demand and shrinks when idle.
///
/// Handoff is a rendezvous: a submitted task is given to a worker already
/// waiting for one, and a new worker thread is spawned when none is. Idle
/// workers linger for 60 seconds before exiting, so the pool holds no
/// threads while the dispatcher is quiet and imposes no upper bound while
/// it is busy.
///
/// Threads are named `courier-dispatcher-<n>`.
pub struct CachedPool {
    inner: Arc<Inner>,
}

struct Inner {
    tx: SyncSender<Task>,
    rx: Mutex<Receiver<Task>>,
    next_worker: AtomicUsize,
}

impl CachedPool {
    /// Creates an empty pool. No thread is spawned until the first task.
    pub fn new() -> CachedPool {
        // Zero capacity makes try_send succeed only when a worker is
        // already parked in recv, which is exactly the "idle worker
        // available" test.
        let (tx, rx) = mpsc::sync_channel(0);
        CachedPool {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
                next_worker: AtomicUsize::new(0),
            }),
        }
    }

    fn spawn_worker(&self, first: Task) {
        let inner = self.inner.clone();
        let id = inner.next_worker.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-{}", THREAD_NAME, id))
            .spawn(move || {
                let mut task = first;
                loop {
                    task();
                    let next = {
                        let rx = inner.rx.lock().unwrap_or_else(|e| e.into_inner());
                        rx.recv_timeout(KEEP_ALIVE)
                    };
                    match next {
                        Ok(t) => task = t,
                        Err(RecvTimeoutError::Timeout)
                        | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .expect("failed to spawn dispatcher worker thread");
    }
}

impl Executor for CachedPool {
    fn execute(&self, task: Task) {
        match self.inner.tx.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => {
                self.spawn_worker(task)
            }
        }
    }
}

impl Default for CachedPool {
    fn default() -> CachedPool {
        CachedPool::new()
    }
}

impl fmt::Debug for CachedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPool")
            .field("spawned", &self.inner.next_worker.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::Barrier;

    #[test]
    fn runs_a_task() {
        let pool = CachedPool::new();
        let (tx, rx) = channel();
        pool.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(name.unwrap().starts_with(THREAD_NAME));
    }

    #[test]
    fn grows_for_concurrent_tasks() {
        let pool = CachedPool::new();
        let barrier = Arc::new(Barrier::new(3));
        for _ in 0..2 {
            let barrier = barrier.clone();
            pool.execute(Box::new(move || {
                barrier.wait();
            }));
        }
        // Only passes if both tasks are running at the same time.
        barrier.wait();
    }

    #[test]
    fn survives_a_panicking_task() {
        let pool = CachedPool::new();
        pool.execute(Box::new(|| panic!("boom")));
        let (tx, rx) = channel();
        pool.execute(Box::new(move || {
            tx.send(()).unwrap();
        }));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
