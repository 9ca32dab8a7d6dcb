//! Bridge from the push-based [Subscriber] callbacks into an async receiver.

use parking_lot::Mutex;
use rsocket_flow_core::Payload;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Next(Payload),
    Complete,
    Error(StreamError),
}

impl StreamEvent {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }
}

type SubscriptionSlot = Arc<Mutex<Option<Arc<dyn Subscription>>>>;

/// A [Subscriber] forwarding every signal into a tokio unbounded channel.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<StreamEvent>,
    initial_request: i64,
    subscription: SubscriptionSlot,
}

/// The receiving end of a [ChannelSubscriber].
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    subscription: SubscriptionSlot,
}

/// Create a subscriber asking for `initial_request` items as soon as it is subscribed.
pub fn channel_subscriber(initial_request: i64) -> (Arc<ChannelSubscriber>, ChannelReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription: SubscriptionSlot = Arc::new(Mutex::new(None));
    let sub = ChannelSubscriber { tx, initial_request, subscription: subscription.clone() };
    (Arc::new(sub), ChannelReceiver { rx, subscription })
}

impl ChannelSubscriber {
    fn send(&self, event: StreamEvent) {
        if event.is_terminal() {
            *self.subscription.lock() = None;
        }
        // the receiver may be gone, nothing to tell then
        let _ = self.tx.send(event);
    }
}

impl Subscriber for ChannelSubscriber {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(subscription.clone());
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, payload: Payload) {
        self.send(StreamEvent::Next(payload));
    }

    fn on_complete(&self) {
        self.send(StreamEvent::Complete);
    }

    fn on_error(&self, error: StreamError) {
        self.send(StreamEvent::Error(error));
    }
}

impl ChannelReceiver {
    /// Returns None once the subscriber is dropped and every event has been received.
    #[inline]
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    #[inline]
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }

    pub fn request(&self, n: i64) {
        let subscription = self.subscription.lock().clone();
        if let Some(s) = subscription {
            s.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = self.subscription.lock().take();
        if let Some(s) = subscription {
            s.cancel();
        }
    }
}
