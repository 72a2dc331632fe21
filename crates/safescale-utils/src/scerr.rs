//! Error taxonomy shared by every SafeScale crate
//!
//! Errors are classified by [`ErrorKind`] rather than by type, so the retry
//! engine and the controller can decide what to do with an error coming from
//! any layer. Context is added by wrapping (the wrapped error becomes the
//! `source()`), and failures met while cleaning up after a primary error are
//! attached as consequences instead of replacing it.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;

/// Classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A caller supplied a value that cannot be used
    InvalidParameter,
    /// A method was called on an instance that is not usable
    InvalidInstance,
    /// The requested resource does not exist
    NotFound,
    /// The resource already exists
    Duplicate,
    /// Stored or observed data contradicts itself
    Inconsistent,
    /// An operation gave up waiting
    Timeout,
    /// An attempt limit was reached
    Overflow,
    /// The operation was aborted and must not be retried
    Aborted,
    /// A panic was caught and converted into an error
    RuntimePanic,
    /// The operation is not implemented
    NotImplemented,
    /// A precondition is not met (no tenant, no reachable master, busy cluster...)
    NotAvailable,
    /// A command ran and failed
    Execution,
    /// A provider stack returned an error it did not classify
    Provider,
    /// Metadata persistence or local I/O failed
    Storage,
}

impl ErrorKind {
    /// Short stable label of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::InvalidInstance => "invalid instance",
            ErrorKind::NotFound => "not found",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Inconsistent => "inconsistent",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Aborted => "aborted",
            ErrorKind::RuntimePanic => "runtime panic",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::NotAvailable => "not available",
            ErrorKind::Execution => "execution",
            ErrorKind::Provider => "provider",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SafeScale error: a kind, a message, an optional cause and the consequences
/// of handling it
#[derive(Error, Debug)]
#[error("{message}{}", render_tail(.cause, .consequences))]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<Error>>,
    retcode: Option<i32>,
    consequences: Vec<Error>,
}

fn render_tail(cause: &Option<Box<Error>>, consequences: &[Error]) -> String {
    let mut tail = String::new();
    if let Some(cause) = cause {
        tail.push_str(": ");
        tail.push_str(&cause.to_string());
    }
    if !consequences.is_empty() {
        let list: Vec<String> = consequences.iter().map(|c| c.to_string()).collect();
        tail.push_str(&format!(" [with consequences: {}]", list.join("; ")));
    }
    tail
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            retcode: None,
            consequences: Vec::new(),
        }
    }

    /// Create an invalid parameter error naming the offending parameter
    pub fn invalid_parameter(what: impl fmt::Display, why: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InvalidParameter,
            format!("invalid parameter '{}': {}", what, why),
        )
    }

    /// Create an invalid instance error
    pub fn invalid_instance() -> Self {
        Self::new(ErrorKind::InvalidInstance, "invalid instance")
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a duplicate error
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    /// Create an inconsistent error
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Inconsistent, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an overflow error (attempt limit reached)
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Overflow, message)
    }

    /// Create an aborted error
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Aborted, message)
    }

    /// Create a runtime panic error
    pub fn runtime_panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimePanic, message)
    }

    /// Create a not implemented error
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    /// Create a not available error
    pub fn not_available(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAvailable, message)
    }

    /// Create an execution error carrying the process return code
    pub fn execution(message: impl Into<String>, retcode: i32) -> Self {
        let mut err = Self::new(ErrorKind::Execution, message);
        err.retcode = Some(retcode);
        err
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Error telling a limit of time elapsed, carrying the last error met
    pub fn timeout_after(limit: Duration, last: Option<Error>) -> Self {
        let err = Self::timeout(format!("retries timed out after {:?}", limit));
        match last {
            Some(cause) => err.with_cause(cause),
            None => err,
        }
    }

    /// Error telling an attempt limit was reached, carrying the last error met
    pub fn limit_reached(limit: u32, last: Option<Error>) -> Self {
        let err = Self::overflow(format!("retry limit exceeded ({} attempts)", limit));
        match last {
            Some(cause) => err.with_cause(cause),
            None => err,
        }
    }

    /// Set the cause of this error
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Set the process return code attached to this error
    pub fn with_retcode(mut self, retcode: i32) -> Self {
        self.retcode = Some(retcode);
        self
    }

    /// Wrap this error with operation context, keeping its kind
    pub fn wrap(self, context: impl Into<String>) -> Self {
        let kind = self.kind;
        let retcode = self.retcode;
        let mut err = Self::new(kind, context).with_cause(self);
        err.retcode = retcode;
        err
    }

    /// Attach an error met while handling this one
    pub fn add_consequence(&mut self, consequence: Error) {
        self.consequences.push(consequence);
    }

    /// Attach several consequences at once
    pub fn with_consequences(mut self, consequences: impl IntoIterator<Item = Error>) -> Self {
        self.consequences.extend(consequences);
        self
    }

    /// Kind of the error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of this error only, without cause
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Direct cause, if any
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// Deepest error of the cause chain
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        current
    }

    /// Process return code, looked up along the cause chain
    pub fn retcode(&self) -> Option<i32> {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.retcode.is_some() {
                return err.retcode;
            }
            current = err.cause.as_deref();
        }
        None
    }

    /// Errors met while handling this one
    pub fn consequences(&self) -> &[Error] {
        &self.consequences
    }

    /// Aborted and runtime panic errors are never retried
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ErrorKind::Aborted | ErrorKind::RuntimePanic)
    }

    /// Errors a caller may retry: the resource may become available later
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::NotAvailable | ErrorKind::Timeout)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::AlreadyExists => ErrorKind::Duplicate,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidParameter,
            _ => ErrorKind::Storage,
        };
        Error::new(kind, format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::inconsistent(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::inconsistent(format!("YAML serialization error: {}", err))
    }
}

/// Run `f`, converting a panic into a [`ErrorKind::RuntimePanic`] error
pub fn catch_panic<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::runtime_panic(format!(
            "panic caught: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_wrap_keeps_kind_and_source() {
        let err = Error::not_found("host 'gw-demo' not found").wrap("failed to start cluster");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "failed to start cluster: host 'gw-demo' not found"
        );
        assert!(err.source().is_some());
        assert_eq!(err.root_cause().message(), "host 'gw-demo' not found");
    }

    #[test]
    fn test_consequences_do_not_replace_primary() {
        let mut err = Error::provider("quota exceeded");
        err.add_consequence(Error::timeout("failed to delete host 'demo-master-1'"));

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.consequences().len(), 1);
        assert!(err.to_string().contains("with consequences"));
    }

    #[test]
    fn test_retcode_found_along_chain() {
        let err = Error::execution("ssh failed", 255).wrap("failed to probe master");
        assert_eq!(err.retcode(), Some(255));
        assert_eq!(Error::aborted("stop").retcode(), None);
    }

    #[test]
    fn test_terminal_and_transient() {
        assert!(Error::aborted("x").is_terminal());
        assert!(Error::runtime_panic("x").is_terminal());
        assert!(!Error::timeout("x").is_terminal());
        assert!(Error::not_available("x").is_transient());
        assert!(!Error::provider("x").is_transient());
    }

    #[test]
    fn test_catch_panic() {
        let result: Result<()> = catch_panic(|| panic!("boom"));
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimePanic);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_io_error_mapping() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(io).kind(), ErrorKind::NotFound);
    }
}
