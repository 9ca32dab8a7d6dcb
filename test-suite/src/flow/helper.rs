//! Test doubles recording what the state machines write and signal.

use parking_lot::Mutex;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use rsocket_flow_core::{Payload, StreamId, StreamType};
use rsocket_flow_stream::connection::ChannelAcceptor;
use rsocket_flow_stream::writer::StreamsWriter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    NewStream { id: StreamId, stream_type: StreamType, initial_request_n: u32, payload: Payload },
    RequestN { id: StreamId, n: u32 },
    Cancel { id: StreamId },
    Payload { id: StreamId, payload: Payload },
    Complete { id: StreamId },
    ApplicationError { id: StreamId, message: String },
    InvalidError { id: StreamId, message: String },
    StreamClosed { id: StreamId },
}

/// Records every frame, clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    events: Arc<Mutex<Vec<WireEvent>>>,
}

impl RecordingWriter {
    pub fn events(&self) -> Vec<WireEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<WireEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count<F: Fn(&WireEvent) -> bool>(&self, f: F) -> usize {
        self.events.lock().iter().filter(|e| f(e)).count()
    }

    pub fn closed_count(&self, id: StreamId) -> usize {
        self.count(|e| *e == WireEvent::StreamClosed { id })
    }

    pub fn request_n(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WireEvent::RequestN { n, .. } => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn push(&self, e: WireEvent) {
        self.events.lock().push(e);
    }
}

impl StreamsWriter for RecordingWriter {
    fn write_new_stream(
        &mut self, id: StreamId, stream_type: StreamType, initial_request_n: u32, payload: Payload,
    ) {
        self.push(WireEvent::NewStream { id, stream_type, initial_request_n, payload });
    }

    fn write_request_n(&mut self, id: StreamId, n: u32) {
        self.push(WireEvent::RequestN { id, n });
    }

    fn write_cancel(&mut self, id: StreamId) {
        self.push(WireEvent::Cancel { id });
    }

    fn write_payload(&mut self, id: StreamId, payload: Payload) {
        self.push(WireEvent::Payload { id, payload });
    }

    fn write_complete(&mut self, id: StreamId) {
        self.push(WireEvent::Complete { id });
    }

    fn write_application_error(&mut self, id: StreamId, message: String) {
        self.push(WireEvent::ApplicationError { id, message });
    }

    fn write_invalid_error(&mut self, id: StreamId, message: String) {
        self.push(WireEvent::InvalidError { id, message });
    }

    fn on_stream_closed(&mut self, id: StreamId) {
        self.push(WireEvent::StreamClosed { id });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberEvent {
    Subscribe,
    Next(Payload),
    Complete,
    Error(StreamError),
}

/// Records every signal, optionally requesting more from inside the callbacks.
pub struct RecordingSubscriber {
    events: Mutex<Vec<SubscriberEvent>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    initial_request: i64,
    request_on_next: i64,
}

impl RecordingSubscriber {
    pub fn new(initial_request: i64) -> Arc<Self> {
        Self::with_request_on_next(initial_request, 0)
    }

    pub fn with_request_on_next(initial_request: i64, request_on_next: i64) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            initial_request,
            request_on_next,
        })
    }

    pub fn events(&self) -> Vec<SubscriberEvent> {
        self.events.lock().clone()
    }

    pub fn items(&self) -> Vec<Payload> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SubscriberEvent::Next(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SubscriberEvent::Complete | SubscriberEvent::Error(_)))
            .count()
    }

    pub fn request(&self, n: i64) {
        let s = self.subscription.lock().clone();
        if let Some(s) = s {
            s.request(n);
        }
    }

    pub fn cancel(&self) {
        let s = self.subscription.lock().clone();
        if let Some(s) = s {
            s.cancel();
        }
    }

    fn push(&self, e: SubscriberEvent) {
        self.events.lock().push(e);
    }
}

impl Subscriber for RecordingSubscriber {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.push(SubscriberEvent::Subscribe);
        *self.subscription.lock() = Some(subscription.clone());
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, payload: Payload) {
        self.push(SubscriberEvent::Next(payload));
        if self.request_on_next > 0 {
            self.request(self.request_on_next);
        }
    }

    fn on_complete(&self) {
        self.push(SubscriberEvent::Complete);
    }

    fn on_error(&self, error: StreamError) {
        self.push(SubscriberEvent::Error(error));
    }
}

/// A producer that hands out queued items to `target` as they are requested.
pub struct QueueProducer {
    target: Mutex<Option<Arc<dyn Subscriber>>>,
    items: Mutex<VecDeque<Payload>>,
    complete_when_drained: bool,
    requested: Mutex<Vec<i64>>,
    cancelled: AtomicUsize,
    completed: AtomicBool,
}

impl QueueProducer {
    pub fn new<I: IntoIterator<Item = Payload>>(items: I, complete_when_drained: bool) -> Arc<Self> {
        Arc::new(Self {
            target: Mutex::new(None),
            items: Mutex::new(items.into_iter().collect()),
            complete_when_drained,
            requested: Mutex::new(Vec::new()),
            cancelled: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
        })
    }

    /// Subscribe `target` to this producer.
    pub fn subscribe(self: &Arc<Self>, target: Arc<dyn Subscriber>) {
        *self.target.lock() = Some(target.clone());
        target.on_subscribe(self.clone());
    }

    pub fn requested(&self) -> Vec<i64> {
        self.requested.lock().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn target(&self) -> Option<Arc<dyn Subscriber>> {
        self.target.lock().clone()
    }
}

impl Subscription for QueueProducer {
    fn request(&self, n: i64) {
        self.requested.lock().push(n);
        let Some(target) = self.target() else {
            return;
        };
        for _ in 0..n {
            let item = self.items.lock().pop_front();
            match item {
                Some(p) => target.on_next(p),
                None => break,
            }
        }
        if self.complete_when_drained
            && self.items.lock().is_empty()
            && !self.completed.swap(true, Ordering::SeqCst)
        {
            target.on_complete();
        }
    }

    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        *self.target.lock() = None;
    }
}

/// Accepts every inbound channel, binding `inbound` as its consumer.
pub struct RecordingAcceptor {
    pub inbound: Arc<RecordingSubscriber>,
    accepted: Mutex<Vec<(StreamId, Payload)>>,
    producers: Mutex<Vec<Arc<dyn Subscriber>>>,
}

impl RecordingAcceptor {
    pub fn new(inbound: Arc<RecordingSubscriber>) -> Arc<Self> {
        Arc::new(Self { inbound, accepted: Mutex::new(Vec::new()), producers: Mutex::new(Vec::new()) })
    }

    pub fn accepted(&self) -> Vec<(StreamId, Payload)> {
        self.accepted.lock().clone()
    }

    pub fn producer(&self, idx: usize) -> Option<Arc<dyn Subscriber>> {
        self.producers.lock().get(idx).cloned()
    }
}

impl ChannelAcceptor for RecordingAcceptor {
    fn accept_channel(
        &self, stream_id: StreamId, payload: Payload, producer: Arc<dyn Subscriber>,
    ) -> Arc<dyn Subscriber> {
        self.accepted.lock().push((stream_id, payload));
        self.producers.lock().push(producer);
        self.inbound.clone()
    }
}
