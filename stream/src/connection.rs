//! The stream table of one multiplexed connection.

use crate::handle::ProducerHandle;
use crate::statemachine::{
    ChannelRequester, ChannelResponder, Signal, StreamCtx, StreamRequester, StreamStateMachine,
};
use crate::writer::StreamsWriter;
use captains_log::filter::LogFilter;
use parking_lot::Mutex;
use rsocket_flow_core::error::{RegistryError, StreamError};
use rsocket_flow_core::reactive::{EmptySubscription, Subscriber, Subscription};
use rsocket_flow_core::{ConnectionMode, FlowConfig, Payload, StreamCompletionSignal, StreamId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

/// Local stream ids stop short of the signed 32-bit range.
const STREAM_ID_LIMIT: StreamId = i32::MAX as StreamId - 2;

/// Accepts channels opened by the remote.
pub trait ChannelAcceptor: Send + Sync {
    /// Called once per inbound channel with its first (reassembled) payload.
    ///
    /// `producer` is the subscriber of the items we send back, the application subscribes it
    /// to its producer. The returned subscriber receives the remote's items.
    fn accept_channel(
        &self, stream_id: StreamId, payload: Payload, producer: Arc<dyn Subscriber>,
    ) -> Arc<dyn Subscriber>;
}

/// The default acceptor, fails every inbound channel with an application error.
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectChannels;

impl ChannelAcceptor for RejectChannels {
    fn accept_channel(
        &self, _stream_id: StreamId, _payload: Payload, producer: Arc<dyn Subscriber>,
    ) -> Arc<dyn Subscriber> {
        producer.on_error(StreamError::application("request channel is not supported"));
        Arc::new(CancelSubscriber)
    }
}

struct CancelSubscriber;

impl Subscriber for CancelSubscriber {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        subscription.cancel();
    }

    fn on_next(&self, _payload: Payload) {}

    fn on_complete(&self) {}

    fn on_error(&self, _error: StreamError) {}
}

struct Inner {
    writer: Box<dyn StreamsWriter>,
    streams: HashMap<StreamId, StreamStateMachine>,
    next_stream_id: StreamId,
    last_peer_stream_id: StreamId,
    closed: bool,
}

impl Inner {
    fn next_stream_id(&mut self) -> Result<StreamId, RegistryError> {
        let id = self.next_stream_id;
        if id >= STREAM_ID_LIMIT {
            return Err(RegistryError::StreamIdsExhausted);
        }
        debug_assert!(!self.streams.contains_key(&id));
        self.next_stream_id += 2;
        Ok(id)
    }

    /// A peer stream id must have the peer's parity and grow monotonically.
    fn register_peer_stream_id(&mut self, id: StreamId) -> bool {
        if id == 0 || self.next_stream_id % 2 == id % 2 {
            return false;
        }
        if id <= self.last_peer_stream_id {
            return false;
        }
        self.last_peer_stream_id = id;
        true
    }
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<Signal>,
    draining: bool,
}

/// Resets the draining flag when a callback panics, so later signals are not stuck.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut outbox = self.0.lock();
            outbox.draining = false;
            outbox.queue.clear();
        }
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    outbox: Mutex<Outbox>,
    acceptor: Mutex<Arc<dyn ChannelAcceptor>>,
    logger: Arc<LogFilter>,
    config: FlowConfig,
}

impl Shared {
    /// Run one step of the state machine of `id`, then deliver what it signalled.
    ///
    /// Returns false when the stream does not exist.
    pub(crate) fn with_stream<F>(self: &Arc<Self>, id: StreamId, f: F) -> bool
    where
        F: FnOnce(&mut StreamStateMachine, &mut StreamCtx<'_>),
    {
        let weak = Arc::downgrade(self);
        let mut signals = Vec::new();
        {
            let mut guard = self.inner.lock();
            let Inner { writer, streams, .. } = &mut *guard;
            let Some(sm) = streams.get_mut(&id) else {
                logger_debug!(self.logger, "stream {} is unknown, ignored", id);
                return false;
            };
            let mut ctx = StreamCtx::new(id, &self.logger, &weak, writer.as_mut(), &mut signals);
            f(sm, &mut ctx);
            if ctx.is_detached() {
                streams.remove(&id);
                writer.on_stream_closed(id);
                logger_debug!(self.logger, "stream {} closed", id);
            }
        }
        self.dispatch(signals);
        true
    }

    fn open_stream(
        &self, make: impl FnOnce(u32) -> StreamStateMachine,
    ) -> Result<StreamId, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(RegistryError::Closed);
        }
        let id = inner.next_stream_id()?;
        let sm = make(self.config.max_request_n);
        logger_debug!(self.logger, "stream {} created as {} requester", id, sm.stream_type());
        inner.streams.insert(id, sm);
        Ok(id)
    }

    /// Bind the consumer of `id`, a stream that is already gone gets a completed lifecycle.
    fn subscribe_consumer(self: &Arc<Self>, id: StreamId, subscriber: Arc<dyn Subscriber>) {
        let mut pending = Some(subscriber);
        self.with_stream(id, |sm, ctx| {
            if let Some(s) = pending.take() {
                sm.subscribe(s, ctx);
            }
        });
        if let Some(s) = pending {
            self.dispatch(vec![Signal::Subscribe(s.clone(), Arc::new(EmptySubscription)), Signal::Complete(s)]);
        }
    }

    fn reject(self: &Arc<Self>, subscriber: Arc<dyn Subscriber>, e: RegistryError) {
        let error = match e {
            RegistryError::Closed => StreamError::ConnectionClosed,
            other => StreamError::application(other.to_string()),
        };
        self.dispatch(vec![
            Signal::Subscribe(subscriber.clone(), Arc::new(EmptySubscription)),
            Signal::Error(subscriber, error),
        ]);
    }

    /// Deliver signals in FIFO order. A nested call, made from inside a callback, only
    /// queues, the outermost caller delivers.
    fn dispatch(self: &Arc<Self>, signals: Vec<Signal>) {
        {
            let mut outbox = self.outbox.lock();
            outbox.queue.extend(signals);
            if outbox.draining || outbox.queue.is_empty() {
                return;
            }
            outbox.draining = true;
        }
        let _guard = DrainGuard(&self.outbox);
        loop {
            let signal = {
                let mut outbox = self.outbox.lock();
                match outbox.queue.pop_front() {
                    Some(signal) => signal,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.deliver(signal);
        }
    }

    fn deliver(self: &Arc<Self>, signal: Signal) {
        match signal {
            Signal::Subscribe(subscriber, subscription) => subscriber.on_subscribe(subscription),
            Signal::Next(subscriber, payload) => subscriber.on_next(payload),
            Signal::Complete(subscriber) => subscriber.on_complete(),
            Signal::Error(subscriber, error) => subscriber.on_error(error),
            Signal::Request(subscription, n) => subscription.request(n),
            Signal::Cancel(subscription) => subscription.cancel(),
            Signal::NewChannel(id, payload) => {
                logger_debug!(self.logger, "stream {} new channel from remote", id);
                let acceptor = self.acceptor.lock().clone();
                let producer = Arc::new(ProducerHandle::new(id, Arc::downgrade(self)));
                let inbound = acceptor.accept_channel(id, payload, producer);
                self.subscribe_consumer(id, inbound);
            }
        }
    }
}

/// Owns every live stream of one connection, keyed by stream id.
///
/// Inbound frames, once decoded, are routed with the `on_*_frame` methods. Frames for streams
/// that do not exist (never opened, or already finished) are ignored.
#[derive(Clone)]
pub struct StreamsConnection {
    shared: Arc<Shared>,
}

impl StreamsConnection {
    pub fn new<W: StreamsWriter + 'static>(mode: ConnectionMode, config: FlowConfig, writer: W) -> Self {
        let logger = Arc::new(LogFilter::new());
        logger.set_level(config.log_level);
        let next_stream_id = match mode {
            ConnectionMode::Client => 1,
            ConnectionMode::Server => 2,
        };
        let inner = Inner {
            writer: Box::new(writer),
            streams: HashMap::new(),
            next_stream_id,
            last_peer_stream_id: 0,
            closed: false,
        };
        let shared = Shared {
            inner: Mutex::new(inner),
            outbox: Mutex::new(Outbox::default()),
            acceptor: Mutex::new(Arc::new(RejectChannels)),
            logger,
            config,
        };
        Self { shared: Arc::new(shared) }
    }

    #[inline]
    pub fn config(&self) -> &FlowConfig {
        &self.shared.config
    }

    /// Change the log level of this connection on the fly.
    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.shared.logger.set_level(level);
    }

    pub fn set_acceptor(&self, acceptor: Arc<dyn ChannelAcceptor>) {
        *self.shared.acceptor.lock() = acceptor;
    }

    /// Open a request-stream. Nothing is written until the subscriber requests.
    pub fn request_stream(
        &self, payload: Payload, subscriber: Arc<dyn Subscriber>,
    ) -> Result<StreamId, RegistryError> {
        let res = self
            .shared
            .open_stream(|max| StreamStateMachine::Stream(StreamRequester::new(payload, max)));
        match res {
            Ok(id) => {
                self.shared.subscribe_consumer(id, subscriber);
                Ok(id)
            }
            Err(e) => {
                self.shared.reject(subscriber, e);
                Err(e)
            }
        }
    }

    /// Register a request-stream whose opening frame was sent out of band, with `allowance`
    /// credit already granted to the remote.
    pub fn adopt_stream(
        &self, stream_id: StreamId, allowance: u64, subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), RegistryError> {
        let res = {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                Err(RegistryError::Closed)
            } else if stream_id == 0 || stream_id >= STREAM_ID_LIMIT {
                Err(RegistryError::InvalidStreamId(stream_id))
            } else if inner.streams.contains_key(&stream_id) {
                Err(RegistryError::StreamIdInUse(stream_id))
            } else {
                let mut sm = StreamRequester::new(Payload::default(), self.shared.config.max_request_n);
                sm.set_requested(allowance);
                inner.streams.insert(stream_id, StreamStateMachine::Stream(sm));
                if inner.next_stream_id <= stream_id && inner.next_stream_id % 2 == stream_id % 2 {
                    // below the limit, cannot overflow
                    inner.next_stream_id = stream_id + 2;
                }
                Ok(())
            }
        };
        match res {
            Ok(()) => {
                self.shared.subscribe_consumer(stream_id, subscriber);
                Ok(())
            }
            Err(e) => {
                logger_warn!(self.shared.logger, "stream {} adopt refused: {}", stream_id, e);
                self.shared.reject(subscriber, e);
                Err(e)
            }
        }
    }

    /// Open a request-channel.
    ///
    /// With `payload` the stream opens as soon as the producer subscribes to the returned
    /// handle, otherwise the producer's first item opens it.
    pub fn request_channel(
        &self, payload: Option<Payload>, subscriber: Arc<dyn Subscriber>,
    ) -> Result<ProducerHandle, RegistryError> {
        let res = self.shared.open_stream(|max| {
            StreamStateMachine::ChannelRequester(ChannelRequester::new(payload, max))
        });
        match res {
            Ok(id) => {
                self.shared.subscribe_consumer(id, subscriber);
                Ok(ProducerHandle::new(id, Arc::downgrade(&self.shared)))
            }
            Err(e) => {
                self.shared.reject(subscriber, e);
                Err(e)
            }
        }
    }

    pub fn on_request_n_frame(&self, stream_id: StreamId, n: u32) {
        self.shared.with_stream(stream_id, |sm, ctx| sm.handle_request_n(n, ctx));
    }

    pub fn on_cancel_frame(&self, stream_id: StreamId) {
        self.shared.with_stream(stream_id, |sm, ctx| sm.handle_cancel(ctx));
    }

    pub fn on_payload_frame(
        &self, stream_id: StreamId, payload: Payload, complete: bool, next: bool, follows: bool,
    ) {
        self.shared
            .with_stream(stream_id, |sm, ctx| sm.handle_payload(payload, complete, next, follows, ctx));
    }

    pub fn on_error_frame(&self, stream_id: StreamId, error: StreamError) {
        self.shared.with_stream(stream_id, |sm, ctx| sm.handle_error(error, ctx));
    }

    /// The remote opened a channel, `request_n` is the credit it grants our producer.
    pub fn on_request_channel_frame(
        &self, stream_id: StreamId, request_n: u32, payload: Payload, complete: bool, next: bool,
        follows: bool,
    ) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return;
            }
            if !inner.register_peer_stream_id(stream_id) {
                logger_debug!(self.shared.logger, "stream {} is not a new peer stream, ignored", stream_id);
                return;
            }
            let sm = ChannelResponder::new(request_n, self.shared.config.max_request_n);
            inner.streams.insert(stream_id, StreamStateMachine::ChannelResponder(sm));
        }
        self.shared
            .with_stream(stream_id, |sm, ctx| sm.handle_payload(payload, complete, next, follows, ctx));
    }

    /// Credit granted to the remote and not yet used, 0 for unknown streams.
    pub fn consumer_allowance(&self, stream_id: StreamId) -> u64 {
        let inner = self.shared.inner.lock();
        inner.streams.get(&stream_id).map(|sm| sm.consumer_allowance()).unwrap_or(0)
    }

    pub fn has_streams(&self) -> bool {
        !self.shared.inner.lock().streams.is_empty()
    }

    pub fn stream_count(&self) -> usize {
        self.shared.inner.lock().streams.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }

    /// Override the next local stream id.
    pub fn set_next_stream_id(&self, stream_id: StreamId) {
        self.shared.inner.lock().next_stream_id = stream_id;
    }

    /// End every stream with `signal` and refuse new ones.
    pub fn close(&self, signal: StreamCompletionSignal) {
        let weak = Arc::downgrade(&self.shared);
        let mut signals = Vec::new();
        {
            let mut guard = self.shared.inner.lock();
            if guard.closed {
                return;
            }
            guard.closed = true;
            let Inner { writer, streams, .. } = &mut *guard;
            let mut ids: Vec<StreamId> = streams.keys().copied().collect();
            ids.sort_unstable();
            logger_info!(self.shared.logger, "connection close {} with {} streams", signal, ids.len());
            for id in ids {
                if let Some(mut sm) = streams.remove(&id) {
                    let mut ctx =
                        StreamCtx::new(id, &self.shared.logger, &weak, writer.as_mut(), &mut signals);
                    sm.end_stream(signal, &mut ctx);
                    writer.on_stream_closed(id);
                }
            }
        }
        self.shared.dispatch(signals);
    }
}
