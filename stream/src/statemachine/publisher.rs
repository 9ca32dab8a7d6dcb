use super::{Signal, State, StreamCtx};
use rsocket_flow_core::Allowance;
use rsocket_flow_core::reactive::Subscription;
use std::sync::Arc;

/// The sending half of a stream: forwards credit granted by the remote to the local producer.
pub(crate) struct PublisherBase {
    /// Credit received before the producer subscribed.
    initial_request_n: Allowance,
    subscription: Option<Arc<dyn Subscription>>,
    state: State,
}

#[inline]
fn to_signed(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl PublisherBase {
    pub fn new(initial_request_n: u64) -> Self {
        Self {
            initial_request_n: Allowance::new(initial_request_n),
            subscription: None,
            state: State::Responding,
        }
    }

    pub fn publisher_subscribe(&mut self, subscription: Arc<dyn Subscription>, ctx: &mut StreamCtx) {
        if self.state == State::Closed {
            ctx.emit(Signal::Cancel(subscription));
            return;
        }
        debug_assert!(self.subscription.is_none(), "stream {} producer subscribed twice", ctx.id);
        let initial = self.initial_request_n.consume_all();
        if initial > 0 {
            ctx.emit(Signal::Request(subscription.clone(), to_signed(initial)));
        }
        self.subscription = Some(subscription);
    }

    pub fn process_request_n(&mut self, n: u32, ctx: &mut StreamCtx) {
        if n == 0 || self.state == State::Closed {
            return;
        }
        // REQUEST_N may arrive before the producer subscribed
        match self.subscription.as_ref() {
            Some(subscription) => ctx.emit(Signal::Request(subscription.clone(), n as i64)),
            None => {
                self.initial_request_n.add(n as u64);
            }
        }
    }

    /// Production finished on its own, the subscription is released without cancel.
    pub fn publisher_complete(&mut self) {
        self.state = State::Closed;
        self.subscription = None;
    }

    /// Abort production.
    pub fn terminate_publisher(&mut self, ctx: &mut StreamCtx) {
        self.state = State::Closed;
        if let Some(subscription) = self.subscription.take() {
            ctx.emit(Signal::Cancel(subscription));
        }
    }

    #[inline]
    pub fn publisher_closed(&self) -> bool {
        self.state == State::Closed
    }
}
