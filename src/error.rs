//! Error types and the [`Error`] trait.
//!
//! All errors in this crate implement the [`Error`] trait, which extends
//! [`std::error::Error`] with retry semantics. [`BoxedError`] provides
//! type-erased error handling while preserving retryability. [`InvokeError`]
//! is the failure type of a single operation invocation.

use std::convert::Infallible;
use std::time::Duration;

use snafu::{AsErrorSource, Snafu};

/// Errors that may occur in the crate or in one of its collaborators.
pub trait Error: std::error::Error + AsErrorSource + Send + Sync + 'static {
    /// If true, this indicates that a failed invocation may succeed if the
    /// request pipeline is driven again.
    fn is_retryable(&self) -> bool;

    /// A server-suggested delay before the next attempt, when one was given.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Connection-level failures are worth a second attempt; everything else is
/// assumed to have happened after bytes started flowing.
impl Error for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::TimedOut
                | ErrorKind::Interrupted
        )
    }
}

/// A boxed error that can be used without type parameters.
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Create a new boxed error from a generic `Error`.
    pub fn from_err<E: Error + 'static>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.source.retry_after()
    }
}

/// A failure while invoking one operation of a described interface.
///
/// The retry policy consumes the retryable variants ([`InvokeError::Executing`]
/// and [`InvokeError::Transient`]); everything else propagates to the caller,
/// or to the observer's `on_failure` on the streaming path.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InvokeError {
    /// The transport failed before a response started arriving. This covers
    /// connection establishment and the TLS handshake, so it is retryable.
    #[snafu(display("error executing {method} {url}"))]
    Executing {
        /// HTTP verb of the attempted request.
        method: String,
        /// Full URL of the attempted request.
        url: String,
        /// The underlying transport failure.
        source: BoxedError,
    },

    /// The response arrived but reading its body failed. The server has
    /// already seen the request, so this is terminal.
    #[snafu(display("error reading response {method} {url}"))]
    Reading {
        /// HTTP verb of the request whose response could not be read.
        method: String,
        /// Full URL of the request whose response could not be read.
        url: String,
        /// The underlying read failure.
        source: BoxedError,
    },

    /// The server answered outside the 2xx range.
    #[snafu(display("status {} reading {config_key}", status.as_u16()))]
    Status {
        /// Canonical identity of the failed operation.
        config_key: String,
        /// The response status.
        status: http::StatusCode,
    },

    /// A transient failure that the retry policy may absorb. Raised by an
    /// [`ErrorDecoder`](crate::codec::ErrorDecoder) that classified an
    /// application-level response as worth retrying.
    #[snafu(display("transient failure invoking {config_key}"))]
    Transient {
        /// Canonical identity of the failed operation.
        config_key: String,
        /// Server-suggested delay before the next attempt.
        retry_after: Option<Duration>,
        /// The classified failure.
        source: BoxedError,
    },

    /// The response body was read, but the decoder rejected its contents.
    #[snafu(display("{config_key} could not decode the response"))]
    Decode {
        /// Canonical identity of the failed operation.
        config_key: String,
        /// The underlying decode failure.
        source: BoxedError,
    },

    /// An encoder rejected the body or form arguments of an invocation.
    #[snafu(display("{config_key} could not encode the request body"))]
    Encoding {
        /// Canonical identity of the failed operation.
        config_key: String,
        /// The underlying encode failure.
        source: BoxedError,
    },

    /// An observer callback rejected a decoded element.
    #[snafu(display("observer rejected an element of {config_key}"))]
    Callback {
        /// Canonical identity of the failed operation.
        config_key: String,
        /// The error returned by the callback.
        source: BoxedError,
    },

    /// Expanding the operation's request template failed.
    #[snafu(transparent)]
    Template {
        /// The underlying template failure.
        source: crate::template::TemplateError,
    },

    /// An argument did not fit the role the contract assigned to its position.
    #[snafu(display("argument {index} cannot be used as {expected}"))]
    InvalidArgument {
        /// Position of the offending argument.
        index: usize,
        /// What the operation expected at that position.
        expected: &'static str,
    },

    /// The invoked name is not an operation of the target interface.
    #[snafu(display("interface has no operation named {name}"))]
    UnknownMethod {
        /// The unknown operation name.
        name: String,
    },

    /// The runtime was closed; no new streaming work is accepted.
    #[snafu(display("client runtime is closed"))]
    Closed,
}

impl Error for InvokeError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            InvokeError::Executing { .. } | InvokeError::Transient { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            InvokeError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
