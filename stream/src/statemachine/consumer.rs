use super::{Signal, State, StreamCtx};
use crate::fragments::PayloadFragments;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{EmptySubscription, Subscriber};
use rsocket_flow_core::{Allowance, Payload, StreamCompletionSignal};
use std::sync::Arc;

/// The receiving half of a stream.
///
/// Tracks the credit granted to the remote producer, paces REQUEST_N frames, reassembles
/// fragments and delivers items to the bound subscriber.
pub(crate) struct ConsumerBase {
    /// Credit promised to the remote minus items delivered.
    allowance: Allowance,
    /// Part of `allowance` not yet announced with REQUEST_N.
    pending_allowance: Allowance,
    /// Credit the remote currently knows about.
    active_requests: Allowance,
    fragments: PayloadFragments,
    subscriber: Option<Arc<dyn Subscriber>>,
    state: State,
    max_request_n: u32,
}

impl ConsumerBase {
    pub fn new(max_request_n: u32) -> Self {
        Self {
            allowance: Allowance::default(),
            pending_allowance: Allowance::default(),
            active_requests: Allowance::default(),
            fragments: PayloadFragments::default(),
            subscriber: None,
            state: State::Responding,
            max_request_n,
        }
    }

    #[inline]
    pub fn max_request_n(&self) -> u32 {
        self.max_request_n
    }

    #[inline]
    pub fn allowance(&self) -> u64 {
        self.allowance.get()
    }

    #[inline]
    pub fn consumer_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber>, ctx: &mut StreamCtx) {
        if self.state == State::Closed {
            ctx.emit(Signal::Subscribe(subscriber.clone(), Arc::new(EmptySubscription)));
            ctx.emit(Signal::Complete(subscriber));
            return;
        }
        debug_assert!(self.subscriber.is_none(), "stream {} subscribed twice", ctx.id);
        self.subscriber = Some(subscriber.clone());
        let subscription = ctx.consumer_handle();
        ctx.emit(Signal::Subscribe(subscriber, subscription));
    }

    /// Credit already announced by other means, such as the initial request frame.
    pub fn add_implicit_allowance(&mut self, n: u64) {
        self.allowance.add(n);
        self.active_requests.add(n);
    }

    pub fn generate_request(&mut self, n: u64, ctx: &mut StreamCtx) {
        self.allowance.add(n);
        self.pending_allowance.add(n);
        self.send_requests(ctx);
    }

    /// Flush pending credit, unless the remote already holds at least as much as we would send.
    fn send_requests(&mut self, ctx: &mut StreamCtx) {
        if self.state == State::Closed {
            return;
        }
        let to_sync = self.pending_allowance.get().min(self.max_request_n as u64);
        if self.active_requests.get() <= to_sync {
            let to_sync = self.pending_allowance.consume_up_to(to_sync);
            if to_sync > 0 {
                ctx.write_request_n(to_sync as u32);
                self.active_requests.add(to_sync);
            }
        }
    }

    pub fn process_payload(&mut self, payload: Payload, next: bool, ctx: &mut StreamCtx) {
        if payload.is_empty() && !next {
            return;
        }
        if self.state == State::Closed {
            logger_debug!(ctx.logger, "stream {} consumer closed, drop late {:?}", ctx.id, payload);
            return;
        }
        if !self.allowance.try_consume(1) || !self.active_requests.try_consume(1) {
            self.handle_flow_control_error(ctx);
            return;
        }
        self.send_requests(ctx);
        if let Some(subscriber) = self.subscriber.as_ref() {
            ctx.emit(Signal::Next(subscriber.clone(), payload));
        } else {
            // cancel may race with an item already on the wire
            logger_error!(
                ctx.logger,
                "stream {} consuming subscriber is missing, drop {:?}",
                ctx.id,
                payload
            );
        }
    }

    /// Feed one fragment, returns the reassembled payload with its net next/complete flags
    /// once the last fragment arrived.
    pub fn reassemble(
        &mut self, payload: Payload, next: bool, complete: bool, follows: bool,
    ) -> Option<(Payload, bool, bool)> {
        self.fragments.add_payload(payload, next, complete);
        if follows {
            return None;
        }
        Some(self.fragments.consume_payload_and_flags())
    }

    /// Returns whether the reassembled payload completes the stream.
    pub fn process_fragmented_payload(
        &mut self, payload: Payload, next: bool, complete: bool, follows: bool, ctx: &mut StreamCtx,
    ) -> bool {
        match self.reassemble(payload, next, complete, follows) {
            None => false,
            Some((payload, next, complete)) => {
                self.process_payload(payload, next, ctx);
                complete
            }
        }
    }

    pub fn end_stream(&mut self, signal: StreamCompletionSignal, ctx: &mut StreamCtx) {
        logger_debug!(ctx.logger, "stream {} consumer end {}", ctx.id, signal);
        self.state = State::Closed;
        if let Some(subscriber) = self.subscriber.take() {
            match signal {
                // TODO: report CANCEL as an interruption once peers stop relying on it completing
                StreamCompletionSignal::Complete | StreamCompletionSignal::Cancel => {
                    ctx.emit(Signal::Complete(subscriber))
                }
                _ => ctx.emit(Signal::Error(subscriber, StreamError::Interrupted(signal))),
            }
        }
    }

    /// The local subscriber cancelled, it is not told again.
    pub fn cancel_consumer(&mut self) {
        self.state = State::Closed;
        self.subscriber = None;
    }

    pub fn complete_consumer(&mut self, ctx: &mut StreamCtx) {
        self.state = State::Closed;
        if let Some(subscriber) = self.subscriber.take() {
            ctx.emit(Signal::Complete(subscriber));
        }
    }

    pub fn error_consumer(&mut self, error: StreamError, ctx: &mut StreamCtx) {
        self.state = State::Closed;
        if let Some(subscriber) = self.subscriber.take() {
            ctx.emit(Signal::Error(subscriber, error));
        }
    }

    fn handle_flow_control_error(&mut self, ctx: &mut StreamCtx) {
        logger_warn!(ctx.logger, "stream {} remote sent more items than granted", ctx.id);
        if let Some(subscriber) = self.subscriber.take() {
            ctx.emit(Signal::Error(subscriber, StreamError::SurplusResponse));
        }
        ctx.write_invalid_error("Flow control error".to_string());
        self.end_stream(StreamCompletionSignal::Error, ctx);
        ctx.remove_from_writer();
    }
}
