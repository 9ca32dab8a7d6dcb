#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # rsocket-flow-stream
//!
//! This crate provides the stream state machines of [`rsocket-flow`](https://docs.rs/rsocket-flow):
//! credit-based flow control for the RSocket Stream and Channel interaction models, on top
//! of the reactive-streams traits from [`rsocket-flow-core`](https://docs.rs/rsocket-flow-core).
//!
//! ## The Design
//!
//! A [StreamsConnection](crate::connection::StreamsConnection) owns every live stream of one
//! multiplexed connection, keyed by stream id. Inbound frames, decoded by an external codec,
//! are routed to the state machine of their stream through the `on_*_frame` methods.
//! Outbound frames are written through the [StreamsWriter](crate::writer::StreamsWriter)
//! supplied by the transport.
//!
//! Each state machine is composed from a consumer part (credit granted to the remote,
//! fragment reassembly, REQUEST_N pacing) and, for channels, a publisher part (credit
//! granted by the remote to our local producer).
//!
//! The application never holds a state machine. It gets a
//! [ConsumerHandle](crate::handle::ConsumerHandle) as the `Subscription` of its response
//! subscriber, and for channels a [ProducerHandle](crate::handle::ProducerHandle) acting as
//! the `Subscriber` of its outbound items. Both carry the stream id and a weak reference to
//! the connection.
//!
//! Application callbacks are never invoked while the registry is locked: signals are queued
//! and delivered in order once the state machine has finished its step, so callbacks may
//! call back into the handles.

#[macro_use]
extern crate captains_log;

pub mod connection;
pub mod fragments;
pub mod handle;
pub mod sink;
pub(crate) mod statemachine;
pub mod writer;

pub use rsocket_flow_core as core;
