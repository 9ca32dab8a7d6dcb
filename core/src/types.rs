use std::fmt;

/// Identifies one logical stream on a multiplexed connection.
pub type StreamId = u32;

/// The largest credit a single REQUEST_N bearing frame can carry (2^31 - 1).
pub const MAX_REQUEST_N: u32 = 0x7fff_ffff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    RequestResponse,
    Stream,
    Channel,
    Fnf,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::RequestResponse => "REQUEST_RESPONSE",
            Self::Stream => "STREAM",
            Self::Channel => "CHANNEL",
            Self::Fnf => "FNF",
        };
        f.write_str(s)
    }
}

/// The reason a stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamCompletionSignal {
    Complete,
    Cancel,
    Error,
    ApplicationError,
    InvalidSetup,
    UnsupportedSetup,
    RejectedSetup,
    ConnectionError,
    ConnectionEnd,
    SocketClosed,
}

impl fmt::Display for StreamCompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Complete => "COMPLETE",
            Self::Cancel => "CANCEL",
            Self::Error => "ERROR",
            Self::ApplicationError => "APPLICATION_ERROR",
            Self::InvalidSetup => "INVALID_SETUP",
            Self::UnsupportedSetup => "UNSUPPORTED_SETUP",
            Self::RejectedSetup => "REJECTED_SETUP",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::ConnectionEnd => "CONNECTION_END",
            Self::SocketClosed => "SOCKET_CLOSED",
        };
        f.write_str(s)
    }
}

/// Which side of the connection we are, deciding the parity of locally allocated stream ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Allocates odd stream ids
    Client,
    /// Allocates even stream ids
    Server,
}
