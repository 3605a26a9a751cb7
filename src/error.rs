//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type often returned from methods that can fail.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur while dispatching calls, selecting
/// routes, or resolving cache strategies.
///
/// # Formatting
///
/// The `Display` implementation of this type will only print the details of
/// this level of error, even though it may have been caused by another error
/// and contain that error in its source. To print all the relevant
/// information, including the source chain, use something like
/// `std::error::Report`, or equivalent 3rd party types.
///
/// # Source
///
/// An `Error` may be caused by another error. To aid debugging, those are
/// exposed in `Error::source()` as erased types. While it is possible to
/// check the exact type of the sources, they **can not be depended on**.
/// They may come from private internal dependencies, and are subject to
/// change at any moment.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(super) enum Kind {
    /// An invalid configuration value supplied by the caller.
    ///
    /// A dispatcher limit below 1, a port outside `[1, 65535]`, or an
    /// address URL without a host.
    Config,
    /// A route selector was asked for another route after exhaustion.
    Exhausted,
    /// An `io::Error` occurred while resolving or connecting.
    Io,
}

impl Error {
    pub(super) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(super) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(super) fn new_config() -> Error {
        Error::new(Kind::Config)
    }

    pub(super) fn new_exhausted() -> Error {
        Error::new(Kind::Exhausted)
    }

    pub(super) fn new_io(cause: std::io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    /// Returns true if this error was caused by an invalid configuration
    /// value, such as a dispatcher limit below 1 or an out-of-range port.
    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, Kind::Config)
    }

    /// Returns true if a route selector ran out of routes to attempt.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.inner.kind, Kind::Exhausted)
    }

    /// Returns true if this error was caused by an `io::Error`, such as a
    /// failed DNS lookup.
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io)
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Config => "invalid configuration",
            Kind::Exhausted => "no more routes to attempt",
            Kind::Io => "i/o error",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("courier::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}
