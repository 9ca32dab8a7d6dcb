use super::{ConsumerBase, StreamCtx};
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::Subscriber;
use rsocket_flow_core::{Payload, StreamCompletionSignal, StreamType};
use std::sync::Arc;

/// Requester side of a request-stream interaction.
///
/// The stream is opened lazily by the first `request(n)` of the subscriber, carrying at most
/// `max_request_n` credit, the rest of the ask goes through regular REQUEST_N pacing.
pub(crate) struct StreamRequester {
    consumer: ConsumerBase,
    initial_payload: Option<Payload>,
    requested: bool,
}

impl StreamRequester {
    pub fn new(payload: Payload, max_request_n: u32) -> Self {
        Self { consumer: ConsumerBase::new(max_request_n), initial_payload: Some(payload), requested: false }
    }

    #[inline]
    pub fn consumer(&self) -> &ConsumerBase {
        &self.consumer
    }

    #[inline]
    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>, ctx: &mut StreamCtx) {
        self.consumer.subscribe(subscriber, ctx);
    }

    /// Credit was established out of band, the stream counts as opened.
    pub fn set_requested(&mut self, n: u64) {
        self.requested = true;
        self.consumer.add_implicit_allowance(n);
    }

    pub fn request(&mut self, n: i64, ctx: &mut StreamCtx) {
        if n <= 0 || self.consumer.consumer_closed() {
            return;
        }
        let n = n as u64;
        if self.requested {
            self.consumer.generate_request(n, ctx);
            return;
        }
        self.requested = true;
        let initial = n.min(self.consumer.max_request_n() as u64);
        self.consumer.add_implicit_allowance(initial);
        let payload = self.initial_payload.take().unwrap_or_default();
        ctx.new_stream(StreamType::Stream, initial as u32, payload);
        if n > initial {
            self.consumer.generate_request(n - initial, ctx);
        }
    }

    pub fn cancel(&mut self, ctx: &mut StreamCtx) {
        if self.consumer.consumer_closed() {
            return;
        }
        self.consumer.cancel_consumer();
        // a stream never opened on the wire needs no CANCEL
        if self.requested {
            ctx.write_cancel();
        }
        ctx.remove_from_writer();
    }

    pub fn handle_payload(
        &mut self, payload: Payload, complete: bool, next: bool, follows: bool, ctx: &mut StreamCtx,
    ) {
        if !self.requested {
            self.handle_error(StreamError::application("Haven't sent REQUEST_STREAM yet"), ctx);
            return;
        }
        if self.consumer.process_fragmented_payload(payload, next, complete, follows, ctx) {
            self.consumer.complete_consumer(ctx);
            ctx.remove_from_writer();
        }
    }

    pub fn handle_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        self.consumer.error_consumer(error, ctx);
        ctx.remove_from_writer();
    }

    pub fn end_stream(&mut self, signal: StreamCompletionSignal, ctx: &mut StreamCtx) {
        self.consumer.end_stream(signal, ctx);
    }
}
