//! The outbound capability a transport supplies to the stream state machines.

use rsocket_flow_core::{Payload, StreamId, StreamType};

/// Emits frames on the wire for the streams of one connection.
///
/// Writes are fire-and-forget from the state machine's point of view, backpressure
/// on the socket belongs to the transport.
pub trait StreamsWriter: Send {
    /// Emit the frame opening a stream (REQUEST_STREAM / REQUEST_CHANNEL).
    fn write_new_stream(
        &mut self, stream_id: StreamId, stream_type: StreamType, initial_request_n: u32,
        payload: Payload,
    );

    fn write_request_n(&mut self, stream_id: StreamId, n: u32);

    fn write_cancel(&mut self, stream_id: StreamId);

    fn write_payload(&mut self, stream_id: StreamId, payload: Payload);

    fn write_complete(&mut self, stream_id: StreamId);

    fn write_application_error(&mut self, stream_id: StreamId, message: String);

    /// Report a protocol violation by the remote on this stream.
    fn write_invalid_error(&mut self, stream_id: StreamId, message: String);

    /// The stream left the connection's stream table. Called exactly once per stream.
    fn on_stream_closed(&mut self, stream_id: StreamId);
}
