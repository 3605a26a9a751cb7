//! Call handles tracked by the dispatcher.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Job = Box<dyn FnOnce(&AsyncCall) + Send>;

/// An asynchronous call: a unit of work bound to a host, admitted and run
/// by the [`Dispatcher`](crate::Dispatcher).
///
/// A call is a cheap handle; clones share the same identity, cancellation
/// flag, and job. The job runs at most once, on a worker thread, and
/// receives the call handle so it can observe cancellation at its own
/// interruptible points.
#[derive(Clone)]
pub struct AsyncCall {
    shared: Arc<AsyncShared>,
}

struct AsyncShared {
    host: String,
    canceled: AtomicBool,
    job: Mutex<Option<Job>>,
}

impl AsyncCall {
    /// Creates a call against `host` running `job` when admitted.
    ///
    /// The host is the URL authority the per-host limit counts against;
    /// comparison is case-insensitive, so it is stored lowercased.
    pub fn new<F>(host: impl Into<String>, job: F) -> AsyncCall
    where
        F: FnOnce(&AsyncCall) + Send + 'static,
    {
        AsyncCall {
            shared: Arc::new(AsyncShared {
                host: host.into().to_ascii_lowercase(),
                canceled: AtomicBool::new(false),
                job: Mutex::new(Some(Box::new(job))),
            }),
        }
    }

    /// The host this call counts against.
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    /// Signals cancellation.
    ///
    /// Cancellation is best-effort: the flag is observed by the job at its
    /// next check, and a call that has not started yet may still begin.
    pub fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::SeqCst);
    }

    /// Whether this call has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    /// Runs the job if it has not run yet.
    pub(crate) fn run(&self) {
        let job = self
            .shared
            .job
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(job) = job {
            job(self);
        }
    }

    pub(crate) fn ptr_eq(&self, other: &AsyncCall) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for AsyncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCall")
            .field("host", &self.shared.host)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// A synchronous call: an in-flight blocking request the dispatcher tracks
/// for bookkeeping only.
///
/// Synchronous calls are throttled by their own calling thread, so no
/// admission limit applies; the dispatcher only counts them toward idleness
/// and cancels them with the rest.
#[derive(Clone)]
pub struct SyncCall {
    shared: Arc<SyncShared>,
}

struct SyncShared {
    host: String,
    canceled: AtomicBool,
}

impl SyncCall {
    /// Creates a bookkeeping handle for a blocking call against `host`.
    pub fn new(host: impl Into<String>) -> SyncCall {
        SyncCall {
            shared: Arc::new(SyncShared {
                host: host.into().to_ascii_lowercase(),
                canceled: AtomicBool::new(false),
            }),
        }
    }

    /// The host this call targets.
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::SeqCst);
    }

    /// Whether this call has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    pub(crate) fn ptr_eq(&self, other: &SyncCall) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for SyncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCall")
            .field("host", &self.shared.host)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Either kind of tracked call, as returned by the dispatcher's snapshot
/// accessors.
#[derive(Clone, Debug)]
pub enum Call {
    /// An asynchronous call.
    Async(AsyncCall),
    /// A synchronous call.
    Sync(SyncCall),
}

impl Call {
    /// The host this call targets.
    pub fn host(&self) -> &str {
        match self {
            Call::Async(call) => call.host(),
            Call::Sync(call) => call.host(),
        }
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        match self {
            Call::Async(call) => call.cancel(),
            Call::Sync(call) => call.cancel(),
        }
    }

    /// Whether this call has been canceled.
    pub fn is_canceled(&self) -> bool {
        match self {
            Call::Async(call) => call.is_canceled(),
            Call::Sync(call) => call.is_canceled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn host_is_lowercased() {
        let call = AsyncCall::new("Example.COM", |_| {});
        assert_eq!(call.host(), "example.com");
    }

    #[test]
    fn job_runs_at_most_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();
        let call = AsyncCall::new("example.com", move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        call.run();
        call.run();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_visible_to_job() {
        let observed = Arc::new(AtomicBool::new(false));
        let seen = observed.clone();
        let call = AsyncCall::new("example.com", move |call| {
            seen.store(call.is_canceled(), Ordering::SeqCst);
        });
        call.cancel();
        call.run();
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_identity() {
        let call = AsyncCall::new("example.com", |_| {});
        let clone = call.clone();
        assert!(call.ptr_eq(&clone));
        clone.cancel();
        assert!(call.is_canceled());
    }
}
