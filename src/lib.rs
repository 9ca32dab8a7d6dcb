#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # rsocket-flow
//!
//! Credit-based flow control for the RSocket Stream and Channel interaction models.
//!
//! ## Components
//!
//! - [`rsocket-flow-core`](https://docs.rs/rsocket-flow-core): Allowance, payloads, errors and
//!   the reactive-streams traits.
//! - [`rsocket-flow-stream`](https://docs.rs/rsocket-flow-stream): The stream state machines and
//!   the connection-level stream table.
//!
//! Frame encoding and transports are not part of this crate: plug a codec in front of
//! [StreamsConnection](crate::connection::StreamsConnection) for inbound frames, and implement
//! [StreamsWriter](crate::writer::StreamsWriter) for outbound ones.
//!
//! ## Usage
//!
//! ```no_run
//! use rsocket_flow::prelude::*;
//! # fn demo(writer: impl StreamsWriter + 'static) {
//! let conn = StreamsConnection::new(ConnectionMode::Client, FlowConfig::default(), writer);
//! let (sub, _rx) = channel_subscriber(16);
//! conn.request_stream(Payload::from("hello"), sub).expect("open stream");
//! # }
//! ```

pub use rsocket_flow_core::{error, reactive};
pub use rsocket_flow_stream::{connection, fragments, handle, sink, writer};

pub mod prelude {
    pub use rsocket_flow_core::error::{RegistryError, StreamError};
    pub use rsocket_flow_core::reactive::{EmptySubscription, Subscriber, Subscription};
    pub use rsocket_flow_core::{
        Allowance, ConnectionMode, FlowConfig, MAX_REQUEST_N, Payload, StreamCompletionSignal,
        StreamId, StreamType,
    };
    pub use rsocket_flow_stream::connection::{ChannelAcceptor, RejectChannels, StreamsConnection};
    pub use rsocket_flow_stream::handle::{ConsumerHandle, ProducerHandle};
    pub use rsocket_flow_stream::sink::{ChannelReceiver, ChannelSubscriber, StreamEvent, channel_subscriber};
    pub use rsocket_flow_stream::writer::StreamsWriter;
}
