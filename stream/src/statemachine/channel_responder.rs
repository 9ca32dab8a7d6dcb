use super::{ConsumerBase, PublisherBase, Signal, StreamCtx};
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use rsocket_flow_core::{Payload, StreamCompletionSignal};
use std::sync::Arc;

/// Responder side of a request-channel interaction.
///
/// The stream is already open when this is created. The first reassembled payload is not an
/// ordinary item: it is handed to the application's channel acceptor together with a
/// producer handle, and the subscriber the acceptor returns is bound as our consumer.
pub(crate) struct ChannelResponder {
    consumer: ConsumerBase,
    publisher: PublisherBase,
    new_stream: bool,
}

impl ChannelResponder {
    pub fn new(initial_request_n: u32, max_request_n: u32) -> Self {
        Self {
            consumer: ConsumerBase::new(max_request_n),
            publisher: PublisherBase::new(initial_request_n as u64),
            new_stream: true,
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

    #[inline]
    pub fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>, ctx: &mut StreamCtx) {
        self.publisher.publisher_subscribe(subscription, ctx);
    }

    pub fn on_next(&mut self, payload: Payload, ctx: &mut StreamCtx) {
        if !self.publisher.publisher_closed() {
            ctx.write_payload(payload);
        }
    }

    pub fn on_complete(&mut self, ctx: &mut StreamCtx) {
        if !self.publisher.publisher_closed() {
            self.publisher.publisher_complete();
            ctx.write_complete();
            self.try_complete_channel(ctx);
        }
    }

    pub fn on_error(&mut self, error: StreamError, ctx: &mut StreamCtx) {
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
        self.consumer.generate_request(n as u64, ctx);
    }

    pub fn cancel(&mut self, ctx: &mut StreamCtx) {
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
        let Some((payload, next, complete)) = self.consumer.reassemble(payload, next, complete, follows)
        else {
            return;
        };
        if self.new_stream {
            self.new_stream = false;
            ctx.emit(Signal::NewChannel(ctx.id, payload));
        } else {
            self.consumer.process_payload(payload, next, ctx);
            if ctx.is_detached() {
                // flow control violation tore the stream down
                self.publisher.terminate_publisher(ctx);
                return;
            }
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
