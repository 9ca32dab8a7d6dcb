//! Error types delivered to subscribers and returned by the connection.

use crate::{StreamCompletionSignal, StreamId};
use thiserror::Error;

/// The error a [Subscriber](crate::reactive::Subscriber) receives in `on_error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// An application error, either relayed from the remote or raised locally.
    #[error("{0}")]
    Application(String),
    /// The stream ended with a signal other than completion.
    #[error("stream interrupted: {0}")]
    Interrupted(StreamCompletionSignal),
    /// The remote sent more items than it was granted.
    #[error("Surplus response")]
    SurplusResponse,
    /// The remote reported a protocol violation on this stream.
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("connection closed")]
    ConnectionClosed,
}

impl StreamError {
    #[inline]
    pub fn application(msg: impl Into<String>) -> Self {
        Self::Application(msg.into())
    }
}

/// Failures of connection-level operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("ran out of stream ids")]
    StreamIdsExhausted,
    #[error("stream id {0} is not usable")]
    InvalidStreamId(StreamId),
    #[error("stream id {0} is already in use")]
    StreamIdInUse(StreamId),
    #[error("connection is closed")]
    Closed,
}
