//! Errors surfaced by the agent.
//!
//! Only construction and shutdown report errors to the host. Everything that
//! happens on the request path or on the delivery threads is logged and
//! swallowed, so the instrumented application never observes it.
use std::io;
use std::sync::PoisonError;
use thiserror::Error;

/// Errors returned while setting up or tearing down the agent.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A configured route pattern is not a valid regular expression.
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidRoute {
        /// The pattern as configured.
        pattern: String,
        /// Why the regex engine rejected it.
        #[source]
        source: regex::Error,
    },

    /// A background thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        /// Name of the thread that failed to start.
        name: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The delivery pipeline was already shut down.
    #[error("delivery pipeline already shut down")]
    AlreadyShutdown,

    /// A background thread panicked and could not be joined cleanly.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("{0}")]
    /// Other types of failures not covered by the variants above.
    Other(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Other(err.to_string())
    }
}

/// Failures inside a transport. These never leave the delivery thread; they
/// are logged and folded into the `bool` returned by
/// [`Transport::send`](crate::transport::Transport::send).
#[derive(Error, Debug)]
pub(crate) enum TransportError {
    #[error("not connected to {0}")]
    NotConnected(String),

    #[error("payload of {size} bytes exceeds the maximum frame size of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure to encode a [`Sample`](crate::sample::Sample) as MessagePack.
#[derive(Error, Debug)]
#[error("message pack encoding failed: {0}")]
pub struct EncodeError(String);

impl From<rmp::encode::ValueWriteError> for EncodeError {
    fn from(err: rmp::encode::ValueWriteError) -> Self {
        EncodeError(err.to_string())
    }
}
