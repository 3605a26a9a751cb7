//! Policy on when calls are executed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::call::{AsyncCall, Call, SyncCall};
use crate::rt::{CachedPool, Executor};
use crate::{Error, Result};

const DEFAULT_MAX_REQUESTS: usize = 64;
const DEFAULT_MAX_REQUESTS_PER_HOST: usize = 5;

type IdleCallback = Arc<dyn Fn() + Send + Sync>;

/// Policy on when asynchronous calls are executed.
///
/// Each dispatcher uses an [`Executor`] to run calls internally. If you
/// supply your own executor, it should be able to run the configured
/// maximum number of calls concurrently.
///
/// A dispatcher is a cheap handle; clones share the same queues and
/// limits. Asynchronous calls above the limits wait in a ready queue, in
/// order, and are promoted as capacity opens. Synchronous calls are only
/// tracked, for cancellation and for the idle signal.
pub struct Dispatcher {
    inner: Arc<Mutex<State>>,
}

struct State {
    max_requests: usize,
    max_requests_per_host: usize,
    idle_callback: Option<IdleCallback>,
    /// Executes calls. Created lazily.
    executor: Option<Arc<dyn Executor>>,
    /// Ready async calls in the order they'll be run.
    ready_async: VecDeque<AsyncCall>,
    /// Running asynchronous calls. Includes canceled calls that haven't
    /// finished yet.
    running_async: VecDeque<AsyncCall>,
    /// Running synchronous calls. Includes canceled calls that haven't
    /// finished yet.
    running_sync: VecDeque<SyncCall>,
}

impl Dispatcher {
    /// Creates a dispatcher that runs calls on a lazily created
    /// [`CachedPool`].
    pub fn new() -> Dispatcher {
        Dispatcher::build(None)
    }

    /// Creates a dispatcher that runs calls on the given executor.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Dispatcher {
        Dispatcher::build(Some(executor))
    }

    fn build(executor: Option<Arc<dyn Executor>>) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(Mutex::new(State {
                max_requests: DEFAULT_MAX_REQUESTS,
                max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
                idle_callback: None,
                executor,
                ready_async: VecDeque::new(),
                running_async: VecDeque::new(),
                running_sync: VecDeque::new(),
            })),
        }
    }

    // A panicking job runs outside the critical section and can never
    // poison this lock; recover rather than wedge every later call.
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedules an asynchronous call.
    ///
    /// The call starts immediately if both the global and the per-host
    /// limit have room; otherwise it waits in the ready queue. Admission
    /// always succeeds logically — excess work merely waits.
    pub fn enqueue(&self, call: AsyncCall) {
        let mut state = self.state();
        if state.running_async.len() < state.max_requests
            && running_calls_for_host(&state.running_async, call.host())
                < state.max_requests_per_host
        {
            trace!(host = call.host(), "call admitted");
            state.running_async.push_back(call.clone());
            self.execute(&mut state, call);
        } else {
            trace!(host = call.host(), "call queued");
            state.ready_async.push_back(call);
        }
    }

    /// Submits `call` to the executor, wrapped so that completion is
    /// reported even if the job panics.
    fn execute(&self, state: &mut State, call: AsyncCall) {
        let executor = state
            .executor
            .get_or_insert_with(|| Arc::new(CachedPool::new()))
            .clone();
        let guard = FinishGuard {
            dispatcher: self.clone(),
            call,
        };
        executor.execute(Box::new(move || guard.call.run()));
    }

    /// Records that a synchronous call is in flight.
    pub fn executed(&self, call: &SyncCall) {
        self.state().running_sync.push_back(call.clone());
    }

    /// Records that a synchronous call has completed.
    ///
    /// # Panics
    ///
    /// Panics if the call was never recorded with [`executed`][Self::executed];
    /// that is a bug in the caller.
    pub fn finished(&self, call: &SyncCall) {
        let idle = {
            let mut state = self.state();
            match state.running_sync.iter().position(|c| c.ptr_eq(call)) {
                Some(i) => {
                    state.running_sync.remove(i);
                }
                None => panic!("call was not in-flight"),
            }
            state.idle_snapshot()
        };
        notify_idle(idle);
    }

    /// Async completion, reported by the task wrapper.
    fn finished_async(&self, call: &AsyncCall) {
        let idle = {
            let mut state = self.state();
            match state.running_async.iter().position(|c| c.ptr_eq(call)) {
                Some(i) => {
                    state.running_async.remove(i);
                }
                None => panic!("call was not in-flight"),
            }
            self.promote_calls(&mut state);
            state.idle_snapshot()
        };
        notify_idle(idle);
    }

    /// Promotes eligible calls from the ready queue after capacity opened.
    ///
    /// Candidates whose host is saturated stay queued and may be passed
    /// over by later calls to other hosts; global throughput takes
    /// priority over strict cross-host FIFO.
    fn promote_calls(&self, state: &mut State) {
        if state.running_async.len() >= state.max_requests {
            return; // Already running max capacity.
        }
        if state.ready_async.is_empty() {
            return; // No ready calls to promote.
        }
        let mut i = 0;
        while i < state.ready_async.len() {
            let eligible = running_calls_for_host(
                &state.running_async,
                state.ready_async[i].host(),
            ) < state.max_requests_per_host;
            if !eligible {
                i += 1;
                continue;
            }
            let Some(call) = state.ready_async.remove(i) else {
                break;
            };
            trace!(host = call.host(), "call promoted");
            state.running_async.push_back(call.clone());
            self.execute(state, call);
            if state.running_async.len() >= state.max_requests {
                return; // Reached max capacity.
            }
        }
    }

    /// Cancels all calls currently enqueued or executing, both
    /// synchronous and asynchronous.
    ///
    /// Cancellation is best-effort: each call observes the signal at its
    /// next interruptible step, and its queue entry is removed only by its
    /// normal completion path.
    pub fn cancel_all(&self) {
        debug!("canceling all calls");
        let state = self.state();
        for call in &state.ready_async {
            call.cancel();
        }
        for call in &state.running_async {
            call.cancel();
        }
        for call in &state.running_sync {
            call.cancel();
        }
    }

    /// Sets the maximum number of requests to execute concurrently.
    /// Above this, requests queue in memory, waiting for running calls to
    /// complete. Defaults to 64.
    ///
    /// If more than `max` requests are in flight when this is invoked,
    /// those requests remain in flight.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max` is zero.
    pub fn set_max_requests(&self, max: usize) -> Result<()> {
        if max < 1 {
            return Err(Error::new_config().with(format!("max < 1: {}", max)));
        }
        let mut state = self.state();
        state.max_requests = max;
        self.promote_calls(&mut state);
        Ok(())
    }

    /// The maximum number of requests to execute concurrently.
    pub fn max_requests(&self) -> usize {
        self.state().max_requests
    }

    /// Sets the maximum number of requests for each host to execute
    /// concurrently, keyed by the URL's host name. Defaults to 5.
    ///
    /// Note that concurrent requests to a single IP address may still
    /// exceed this limit: multiple hostnames may share an IP address or
    /// be routed through the same HTTP proxy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max` is zero.
    pub fn set_max_requests_per_host(&self, max: usize) -> Result<()> {
        if max < 1 {
            return Err(Error::new_config().with(format!("max < 1: {}", max)));
        }
        let mut state = self.state();
        state.max_requests_per_host = max;
        self.promote_calls(&mut state);
        Ok(())
    }

    /// The maximum number of requests per host to execute concurrently.
    pub fn max_requests_per_host(&self) -> usize {
        self.state().max_requests_per_host
    }

    /// Sets a callback to be invoked each time the dispatcher becomes
    /// idle: when the number of running calls returns to zero.
    ///
    /// The callback runs on the thread that completed the last call,
    /// after the dispatcher's own bookkeeping is done. An asynchronous
    /// call counts until its job has returned; a synchronous call counts
    /// until [`finished`][Self::finished] is reported for it.
    pub fn set_idle_callback(&self, callback: Option<Box<dyn Fn() + Send + Sync>>) {
        self.state().idle_callback = callback.map(Arc::from);
    }

    /// A snapshot of the calls currently awaiting execution.
    pub fn queued_calls(&self) -> Vec<Call> {
        self.state()
            .ready_async
            .iter()
            .cloned()
            .map(Call::Async)
            .collect()
    }

    /// A snapshot of the calls currently being executed, synchronous
    /// calls first.
    pub fn running_calls(&self) -> Vec<Call> {
        let state = self.state();
        let mut calls = Vec::with_capacity(state.running_sync.len() + state.running_async.len());
        calls.extend(state.running_sync.iter().cloned().map(Call::Sync));
        calls.extend(state.running_async.iter().cloned().map(Call::Async));
        calls
    }

    /// The number of calls awaiting execution.
    pub fn queued_calls_count(&self) -> usize {
        self.state().ready_async.len()
    }

    /// The number of calls currently being executed, synchronous and
    /// asynchronous.
    pub fn running_calls_count(&self) -> usize {
        let state = self.state();
        state.running_async.len() + state.running_sync.len()
    }
}

impl State {
    /// The idle callback to fire, if this was the transition to zero
    /// running calls. Resolved inside the critical section, invoked
    /// outside it.
    fn idle_snapshot(&self) -> Option<IdleCallback> {
        if self.running_async.is_empty() && self.running_sync.is_empty() {
            self.idle_callback.clone()
        } else {
            None
        }
    }
}

fn notify_idle(callback: Option<IdleCallback>) {
    if let Some(callback) = callback {
        debug!("dispatcher idle");
        callback();
    }
}

fn running_calls_for_host(running: &VecDeque<AsyncCall>, host: &str) -> usize {
    running.iter().filter(|c| c.host() == host).count()
}

/// Reports completion when the wrapped task finishes, even by panic; the
/// dispatcher's slot accounting must not leak.
struct FinishGuard {
    dispatcher: Dispatcher,
    call: AsyncCall,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.dispatcher.finished_async(&self.call);
    }
}

impl Clone for Dispatcher {
    fn clone(&self) -> Dispatcher {
        Dispatcher {
            inner: self.inner.clone(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Dispatcher {
        Dispatcher::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Dispatcher")
            .field("max_requests", &state.max_requests)
            .field("max_requests_per_host", &state.max_requests_per_host)
            .field("queued", &state.ready_async.len())
            .field("running", &(state.running_async.len() + state.running_sync.len()))
            .finish()
    }
}
