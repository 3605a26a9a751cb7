//! A blacklist of routes that recently failed.

use std::sync::{Arc, Mutex};

use crate::route::Route;

/// The set of routes that have failed recently.
///
/// The database is shared by every route selector of a client, so a route
/// that failed for one connection attempt is deprioritized for all of
/// them: selectors postpone known-bad routes to the back of their
/// sequence. Handles are cheap clones of the same set.
#[derive(Clone, Debug, Default)]
pub struct RouteDatabase {
    inner: Arc<Mutex<Vec<Route>>>,
}

impl RouteDatabase {
    /// Creates an empty database.
    pub fn new() -> RouteDatabase {
        RouteDatabase::default()
    }

    /// Records a connection failure on `route`.
    pub fn failed(&self, route: &Route) {
        let mut failed = self.lock();
        if !failed.contains(route) {
            failed.push(route.clone());
        }
    }

    /// Records a success on `route`, removing it from the set.
    pub fn connected(&self, route: &Route) {
        self.lock().retain(|failed| failed != route);
    }

    /// Whether `route` should be attempted after the fresh candidates.
    pub fn should_postpone(&self, route: &Route) -> bool {
        self.lock().contains(route)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
