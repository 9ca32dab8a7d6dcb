//! Per-stream state machines.
//!
//! A state machine never calls application code directly. Everything it wants to tell a
//! subscriber or a producing subscription is pushed as a [Signal] into the [StreamCtx] of
//! the current step, and the connection delivers the signals after releasing its lock.

use crate::connection::Shared;
use crate::handle::ConsumerHandle;
use crate::writer::StreamsWriter;
use captains_log::filter::LogFilter;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use rsocket_flow_core::{Payload, StreamCompletionSignal, StreamId, StreamType};
use std::sync::{Arc, Weak};

mod channel_requester;
mod channel_responder;
mod consumer;
mod publisher;
mod stream_requester;

pub(crate) use channel_requester::ChannelRequester;
pub(crate) use channel_responder::ChannelResponder;
pub(crate) use consumer::ConsumerBase;
pub(crate) use publisher::PublisherBase;
pub(crate) use stream_requester::StreamRequester;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Responding,
    Closed,
}

/// A deferred call into application code.
pub(crate) enum Signal {
    Subscribe(Arc<dyn Subscriber>, Arc<dyn Subscription>),
    Next(Arc<dyn Subscriber>, Payload),
    Complete(Arc<dyn Subscriber>),
    Error(Arc<dyn Subscriber>, StreamError),
    Request(Arc<dyn Subscription>, i64),
    Cancel(Arc<dyn Subscription>),
    /// First payload of an inbound channel, to be handed to the acceptor.
    NewChannel(StreamId, Payload),
}

/// Everything one step of a state machine may touch besides its own state.
pub(crate) struct StreamCtx<'a> {
    pub id: StreamId,
    pub logger: &'a LogFilter,
    conn: &'a Weak<Shared>,
    writer: &'a mut dyn StreamsWriter,
    signals: &'a mut Vec<Signal>,
    detached: bool,
}

impl<'a> StreamCtx<'a> {
    pub fn new(
        id: StreamId, logger: &'a LogFilter, conn: &'a Weak<Shared>,
        writer: &'a mut dyn StreamsWriter, signals: &'a mut Vec<Signal>,
    ) -> Self {
        Self { id, logger, conn, writer, signals, detached: false }
    }

    #[inline]
    pub fn emit(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    /// The subscription handed to the consumer of this stream.
    pub fn consumer_handle(&self) -> Arc<dyn Subscription> {
        Arc::new(ConsumerHandle::new(self.id, self.conn.clone()))
    }

    pub fn new_stream(&mut self, stream_type: StreamType, initial_request_n: u32, payload: Payload) {
        logger_debug!(
            self.logger,
            "stream {} open {} initial_request_n={}",
            self.id,
            stream_type,
            initial_request_n
        );
        self.writer.write_new_stream(self.id, stream_type, initial_request_n, payload);
    }

    pub fn write_request_n(&mut self, n: u32) {
        logger_trace!(self.logger, "stream {} REQUEST_N {}", self.id, n);
        self.writer.write_request_n(self.id, n);
    }

    #[inline]
    pub fn write_cancel(&mut self) {
        self.writer.write_cancel(self.id);
    }

    #[inline]
    pub fn write_payload(&mut self, payload: Payload) {
        self.writer.write_payload(self.id, payload);
    }

    #[inline]
    pub fn write_complete(&mut self) {
        self.writer.write_complete(self.id);
    }

    #[inline]
    pub fn write_application_error(&mut self, message: String) {
        self.writer.write_application_error(self.id, message);
    }

    #[inline]
    pub fn write_invalid_error(&mut self, message: String) {
        self.writer.write_invalid_error(self.id, message);
    }

    /// Ask the connection to drop this stream once the current step is over.
    #[inline]
    pub fn remove_from_writer(&mut self) {
        self.detached = true;
    }

    #[inline]
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// One stream of the connection, whichever interaction and role it plays.
pub(crate) enum StreamStateMachine {
    Stream(StreamRequester),
    ChannelRequester(ChannelRequester),
    ChannelResponder(ChannelResponder),
}

impl StreamStateMachine {
    fn consumer(&self) -> &ConsumerBase {
        match self {
            Self::Stream(s) => s.consumer(),
            Self::ChannelRequester(s) => s.consumer(),
            Self::ChannelResponder(s) => s.consumer(),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Stream(_) => StreamType::Stream,
            _ => StreamType::Channel,
        }
    }

    #[inline]
    pub fn consumer_allowance(&self) -> u64 {
        self.consumer().allowance()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(s) => s.subscribe(subscriber, ctx),
            Self::ChannelRequester(s) => s.subscribe(subscriber, ctx),
            Self::ChannelResponder(s) => s.subscribe(subscriber, ctx),
        }
    }

    /// [Subscription::request] from the consumer of this stream.
    pub fn request(&mut self, n: i64, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(s) => s.request(n, ctx),
            Self::ChannelRequester(s) => s.request(n, ctx),
            Self::ChannelResponder(s) => s.request(n, ctx),
        }
    }

    /// [Subscription::cancel] from the consumer of this stream.
    pub fn cancel(&mut self, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(s) => s.cancel(ctx),
            Self::ChannelRequester(s) => s.cancel(ctx),
            Self::ChannelResponder(s) => s.cancel(ctx),
        }
    }

    pub fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {
                logger_warn!(ctx.logger, "stream {} has no outbound items, cancel producer", ctx.id);
                ctx.emit(Signal::Cancel(subscription));
            }
            Self::ChannelRequester(s) => s.on_subscribe(subscription, ctx),
            Self::ChannelResponder(s) => s.on_subscribe(subscription, ctx),
        }
    }

    pub fn on_next(&mut self, payload: Payload, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {
                logger_warn!(ctx.logger, "stream {} has no outbound items, drop {:?}", ctx.id, payload);
            }
            Self::ChannelRequester(s) => s.on_next(payload, ctx),
            Self::ChannelResponder(s) => s.on_next(payload, ctx),
        }
    }

    pub fn on_complete(&mut self, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {}
            Self::ChannelRequester(s) => s.on_complete(ctx),
            Self::ChannelResponder(s) => s.on_complete(ctx),
        }
    }

    pub fn on_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {}
            Self::ChannelRequester(s) => s.on_error(error, ctx),
            Self::ChannelResponder(s) => s.on_error(error, ctx),
        }
    }

    pub fn handle_payload(
        &mut self, payload: Payload, complete: bool, next: bool, follows: bool, ctx: &mut StreamCtx,
    ) {
        match self {
            Self::Stream(s) => s.handle_payload(payload, complete, next, follows, ctx),
            Self::ChannelRequester(s) => s.handle_payload(payload, complete, next, follows, ctx),
            Self::ChannelResponder(s) => s.handle_payload(payload, complete, next, follows, ctx),
        }
    }

    pub fn handle_request_n(&mut self, n: u32, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {
                logger_debug!(ctx.logger, "stream {} ignore REQUEST_N {} on a requester", ctx.id, n);
            }
            Self::ChannelRequester(s) => s.handle_request_n(n, ctx),
            Self::ChannelResponder(s) => s.handle_request_n(n, ctx),
        }
    }

    pub fn handle_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(s) => s.handle_error(error, ctx),
            Self::ChannelRequester(s) => s.handle_error(error, ctx),
            Self::ChannelResponder(s) => s.handle_error(error, ctx),
        }
    }

    pub fn handle_cancel(&mut self, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(_) => {
                logger_debug!(ctx.logger, "stream {} ignore CANCEL on a requester", ctx.id);
            }
            Self::ChannelRequester(s) => s.handle_cancel(ctx),
            Self::ChannelResponder(s) => s.handle_cancel(ctx),
        }
    }

    /// Terminate the stream from outside, when the connection goes away.
    pub fn end_stream(&mut self, signal: StreamCompletionSignal, ctx: &mut StreamCtx) {
        match self {
            Self::Stream(s) => s.end_stream(signal, ctx),
            Self::ChannelRequester(s) => s.end_stream(signal, ctx),
            Self::ChannelResponder(s) => s.end_stream(signal, ctx),
        }
    }
}
