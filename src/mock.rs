//! Deterministic collaborators for tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::IpAddr;
use std::sync::Mutex;

use http::Uri;

use crate::route::{Dns, Proxy, ProxySelector};
use crate::rt::{Executor, Task};

/// An executor that captures tasks instead of running them, so tests
/// control exactly when each admitted call completes.
pub(crate) struct RecordingExecutor {
    tasks: Mutex<VecDeque<Task>>,
}

impl RecordingExecutor {
    pub(crate) fn new() -> RecordingExecutor {
        RecordingExecutor {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    /// The number of captured, not yet run, tasks.
    pub(crate) fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Runs the oldest captured task on the calling thread. Returns false
    /// when none are pending.
    pub(crate) fn run_next(&self) -> bool {
        let task = self.tasks.lock().unwrap().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }
}

/// A resolver with scripted answers that records every lookup.
pub(crate) struct FakeDns {
    addresses: Mutex<HashMap<String, Vec<IpAddr>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeDns {
    pub(crate) fn new() -> FakeDns {
        FakeDns {
            addresses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set(&self, host: &str, addresses: Vec<IpAddr>) {
        self.addresses
            .lock()
            .unwrap()
            .insert(host.to_owned(), addresses);
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Dns for FakeDns {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.requests.lock().unwrap().push(host.to_owned());
        self.addresses
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("unknown host: {}", host))
            })
    }
}

/// A proxy selector with a scripted answer that records reported failures.
pub(crate) struct RecordingProxySelector {
    proxies: Option<Vec<Proxy>>,
    failures: Mutex<Vec<Proxy>>,
}

impl RecordingProxySelector {
    /// Selects nothing, so every address connects directly.
    pub(crate) fn direct() -> RecordingProxySelector {
        RecordingProxySelector {
            proxies: None,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Selects the given proxies, in order.
    pub(crate) fn offering(proxies: Vec<Proxy>) -> RecordingProxySelector {
        RecordingProxySelector {
            proxies: Some(proxies),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// The proxies reported as failed, in order.
    pub(crate) fn failures(&self) -> Vec<Proxy> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProxySelector for RecordingProxySelector {
    fn select(&self, _url: &Uri) -> Option<Vec<Proxy>> {
        self.proxies.clone()
    }

    fn connect_failed(&self, _url: &Uri, proxy: &Proxy, _error: &io::Error) {
        self.failures.lock().unwrap().push(proxy.clone());
    }
}
