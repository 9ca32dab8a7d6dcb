use super::{ConsumerBase, PublisherBase, StreamCtx};
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use rsocket_flow_core::{Allowance, Payload, StreamCompletionSignal, StreamType};
use std::sync::Arc;

/// Requester side of a request-channel interaction.
///
/// Items flow both ways: the consumer half receives the remote's items, the publisher half
/// forwards the remote's REQUEST_N to the local producer. The stream ends once both halves
/// are closed, in whatever order.
///
/// Without an initial payload the first item of the local producer opens the stream, so the
/// producer is asked for one item as soon as it subscribes.
pub(crate) struct ChannelRequester {
    consumer: ConsumerBase,
    publisher: PublisherBase,
    initial_payload: Option<Payload>,
    has_initial_request: bool,
    requested: bool,
    /// Consumer credit asked before the stream was opened.
    initial_response_allowance: Allowance,
}

impl ChannelRequester {
    pub fn new(payload: Option<Payload>, max_request_n: u32) -> Self {
        let has_initial_request = payload.is_some();
        Self {
            consumer: ConsumerBase::new(max_request_n),
            publisher: PublisherBase::new(if has_initial_request { 0 } else { 1 }),
            initial_payload: payload,
            has_initial_request,
            requested: false,
            initial_response_allowance: Allowance::default(),
        }
    }

    #[inline]
    pub fn consumer(&self) -> &ConsumerBase {
        &self.consumer
    }

    #[inline]
    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>, ctx: &mut StreamCtx) {
        self.consumer.subscribe(subscriber, ctx);
    }

    pub fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>, ctx: &mut StreamCtx) {
        debug_assert!(!self.requested || !self.has_initial_request);
        self.publisher.publisher_subscribe(subscription, ctx);
        if self.has_initial_request && !self.requested {
            let payload = self.initial_payload.take().unwrap_or_default();
            self.init_stream(payload, ctx);
        }
    }

    pub fn on_next(&mut self, payload: Payload, ctx: &mut StreamCtx) {
        if !self.requested {
            self.init_stream(payload, ctx);
            return;
        }
        if !self.publisher.publisher_closed() {
            ctx.write_payload(payload);
        }
    }

    pub fn on_complete(&mut self, ctx: &mut StreamCtx) {
        if !self.requested {
            self.consumer.end_stream(StreamCompletionSignal::Cancel, ctx);
            self.publisher.publisher_complete();
            ctx.remove_from_writer();
            return;
        }
        if !self.publisher.publisher_closed() {
            self.publisher.publisher_complete();
            ctx.write_complete();
            self.try_complete_channel(ctx);
        }
    }

    pub fn on_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        if !self.requested {
            self.consumer.end_stream(StreamCompletionSignal::Cancel, ctx);
            self.publisher.publisher_complete();
            ctx.remove_from_writer();
            return;
        }
        if !self.publisher.publisher_closed() {
            self.publisher.publisher_complete();
            self.consumer.end_stream(StreamCompletionSignal::Error, ctx);
            ctx.write_application_error(error.to_string());
            self.try_complete_channel(ctx);
        }
    }

    pub fn request(&mut self, n: i64, ctx: &mut StreamCtx) {
        if n <= 0 || self.consumer.consumer_closed() {
            return;
        }
        if !self.requested {
            // split between the opening frame and REQUEST_N once the stream opens
            self.initial_response_allowance.add(n as u64);
            return;
        }
        self.consumer.generate_request(n as u64, ctx);
    }

    pub fn cancel(&mut self, ctx: &mut StreamCtx) {
        if !self.requested {
            self.consumer.end_stream(StreamCompletionSignal::Cancel, ctx);
            self.publisher.terminate_publisher(ctx);
            ctx.remove_from_writer();
            return;
        }
        if self.consumer.consumer_closed() {
            return;
        }
        self.consumer.cancel_consumer();
        ctx.write_cancel();
        self.try_complete_channel(ctx);
    }

    pub fn handle_payload(
        &mut self, payload: Payload, complete: bool, next: bool, follows: bool, ctx: &mut StreamCtx,
    ) {
        if !self.requested {
            self.handle_error(StreamError::application("Haven't sent REQUEST_CHANNEL yet"), ctx);
            return;
        }
        let complete = self.consumer.process_fragmented_payload(payload, next, complete, follows, ctx);
        if ctx.is_detached() {
            // flow control violation tore the stream down
            self.publisher.terminate_publisher(ctx);
            return;
        }
        if complete {
            self.consumer.complete_consumer(ctx);
            self.try_complete_channel(ctx);
        }
    }

    #[inline]
    pub fn handle_request_n(&mut self, n: u32, ctx: &mut StreamCtx) {
        self.publisher.process_request_n(n, ctx);
    }

    pub fn handle_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        self.consumer.error_consumer(error, ctx);
        self.publisher.terminate_publisher(ctx);
        self.try_complete_channel(ctx);
    }

    pub fn handle_cancel(&mut self, ctx: &mut StreamCtx) {
        self.publisher.terminate_publisher(ctx);
        self.try_complete_channel(ctx);
    }

    pub fn end_stream(&mut self, signal: StreamCompletionSignal, ctx: &mut StreamCtx) {
        self.publisher.terminate_publisher(ctx);
        self.consumer.end_stream(signal, ctx);
    }

    fn init_stream(&mut self, payload: Payload, ctx: &mut StreamCtx) {
        self.requested = true;
        let initial = self.initial_response_allowance.consume_up_to(self.consumer.max_request_n() as u64);
        let remaining = self.initial_response_allowance.consume_all();
        ctx.new_stream(StreamType::Channel, initial as u32, payload);
        self.consumer.add_implicit_allowance(initial);
        if remaining > 0 {
            self.consumer.generate_request(remaining, ctx);
        }
    }

    /// Both halves are closed.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.publisher.publisher_closed() && self.consumer.consumer_closed()
    }

    fn try_complete_channel(&mut self, ctx: &mut StreamCtx) {
        if self.is_finished() {
            self.consumer.end_stream(StreamCompletionSignal::Complete, ctx);
            ctx.remove_from_writer();
        }
    }
}
