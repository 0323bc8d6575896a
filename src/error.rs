use std::sync::Arc;

/// An error that can occur in this crate.
///
/// This crate follows the "one true error type" pattern: a single error
/// value is used for every fallible operation, with a small set of `is_*`
/// predicates for the cases callers are expected to branch on. Errors form
/// a causal chain; the chain is rendered by the `Display` impl and exposed
/// through [`std::error::Error::source`].
///
/// Cloning an `Error` is cheap.
#[derive(Clone)]
pub struct Error {
    /// In an `Arc` to make clones cheap and the error one word big.
    inner: Arc<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

#[derive(Clone, Debug)]
pub(crate) enum ErrorKind {
    /// A null/empty identifier, an out-of-range field or a malformed input.
    InvalidArgument(String),
    /// A zone identifier the engine could not resolve. Never cached.
    UnknownZone(String),
    /// An operation that is not valid in the receiver's current state,
    /// such as starting an unarmed timer or supplying the infinite
    /// due-time/period sentinel.
    InvalidOperation(String),
    /// An operation on a disposed resource.
    Disposed(&'static str),
    /// An unrecognized format specifier.
    Format(String),
    /// Civil fields and ticks no longer agree. This is a defect, not a
    /// recoverable condition.
    Inconsistent(String),
    /// A contextual message, usually wrapping an engine error.
    Adhoc(String),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Error {
        Error::from(ErrorKind::InvalidArgument(msg.into()))
    }

    pub(crate) fn unknown_zone(iana_id: &str) -> Error {
        Error::from(ErrorKind::UnknownZone(iana_id.to_string()))
    }

    pub(crate) fn invalid_operation(msg: impl Into<String>) -> Error {
        Error::from(ErrorKind::InvalidOperation(msg.into()))
    }

    pub(crate) fn disposed(what: &'static str) -> Error {
        Error::from(ErrorKind::Disposed(what))
    }

    pub(crate) fn format(specifier: &str) -> Error {
        Error::from(ErrorKind::Format(specifier.to_string()))
    }

    pub(crate) fn inconsistent(msg: impl Into<String>) -> Error {
        Error::from(ErrorKind::Inconsistent(msg.into()))
    }

    pub(crate) fn adhoc(msg: String) -> Error {
        Error::from(ErrorKind::Adhoc(msg))
    }

    /// Returns true when this error was caused by a null, empty or
    /// out-of-range argument.
    pub fn is_invalid_argument(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::InvalidArgument(_)))
    }

    /// Returns true when this error originated from a time zone identifier
    /// that the engine could not resolve.
    pub fn is_unknown_zone(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::UnknownZone(_)))
    }

    /// Returns true when an operation was attempted in a state that does
    /// not permit it.
    pub fn is_invalid_operation(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::InvalidOperation(_)))
    }

    /// Returns true when an operation was attempted on a disposed resource.
    pub fn is_disposed(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::Disposed(_)))
    }

    /// Returns true when a format specifier was not recognized.
    pub fn is_format(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::Format(_)))
    }

    /// Returns true when civil fields and ticks were observed to diverge.
    pub fn is_inconsistent(&self) -> bool {
        self.any(|kind| matches!(*kind, ErrorKind::Inconsistent(_)))
    }

    /// Whether any error in this chain satisfies the given predicate.
    fn any(&self, predicate: impl Fn(&ErrorKind) -> bool) -> bool {
        let mut err = self;
        loop {
            if predicate(&err.inner.kind) {
                return true;
            }
            match err.inner.cause {
                Some(ref cause) => err = cause,
                None => return false,
            }
        }
    }

    /// Attaches `self` as the cause of `consequent` and returns the latter.
    ///
    /// An error chain is a linked list, not a tree, so `consequent` must
    /// not already have a cause.
    pub(crate) fn context_impl(self, consequent: Error) -> Error {
        debug_assert!(consequent.inner.cause.is_none());
        Error {
            inner: Arc::new(ErrorInner {
                kind: consequent.inner.kind.clone(),
                cause: Some(self),
            }),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { inner: Arc::new(ErrorInner { kind, cause: None }) }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        if let Some(ref cause) = self.inner.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if f.alternate() {
            f.debug_struct("Error")
                .field("kind", &self.inner.kind)
                .field("cause", &self.inner.cause)
                .finish()
        } else {
            write!(f, "{self}")
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            ErrorKind::InvalidArgument(ref msg) => {
                write!(f, "invalid argument: {msg}")
            }
            ErrorKind::UnknownZone(ref id) => {
                write!(f, "unknown time zone {id:?}")
            }
            ErrorKind::InvalidOperation(ref msg) => {
                write!(f, "invalid operation: {msg}")
            }
            ErrorKind::Disposed(what) => {
                write!(f, "{what} has been disposed")
            }
            ErrorKind::Format(ref spec) => {
                write!(f, "unrecognized format specifier {spec:?}")
            }
            ErrorKind::Inconsistent(ref msg) => {
                write!(f, "civil fields and ticks diverged: {msg}")
            }
            ErrorKind::Adhoc(ref msg) => write!(f, "{msg}"),
        }
    }
}

/// Creates an ad hoc [`Error`] from `format!` style arguments.
macro_rules! err {
    ($($tt:tt)*) => {
        crate::error::Error::adhoc(format!($($tt)*))
    }
}

pub(crate) use err;

/// A trait for contextualizing error values.
///
/// `result.context(consequent)` replaces the error with `consequent`,
/// keeping the original as its cause. `with_context` hides construction
/// behind a closure so the happy path never pays for it. Borrowed from the
/// way `anyhow` does it.
pub(crate) trait ErrorContext<T> {
    fn context(self, consequent: Error) -> Result<T, Error>;

    fn with_context(
        self,
        consequent: impl FnOnce() -> Error,
    ) -> Result<T, Error>;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn context(self, consequent: Error) -> Result<T, Error> {
        self.map_err(|err| err.context_impl(consequent))
    }

    fn with_context(
        self,
        consequent: impl FnOnce() -> Error,
    ) -> Result<T, Error> {
        self.map_err(|err| err.context_impl(consequent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_one_word() {
        assert_eq!(
            core::mem::size_of::<usize>(),
            core::mem::size_of::<Error>(),
        );
    }

    #[test]
    fn predicates_look_through_context() {
        let err: Result<(), Error> = Err(Error::unknown_zone("Mars/Olympus"));
        let err = err.context(err!("while resolving zone")).unwrap_err();
        assert!(err.is_unknown_zone());
        assert!(!err.is_invalid_argument());
        let rendered = err.to_string();
        assert!(rendered.contains("Mars/Olympus"), "{rendered}");
    }
}
