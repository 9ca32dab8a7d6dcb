//! Lightweight capabilities handed to application code.
//!
//! A handle is a stream id plus a weak reference to the connection. It never keeps the
//! connection or the stream alive, calls on a handle whose stream is gone degrade to no-ops.

use crate::connection::Shared;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::{Subscriber, Subscription};
use rsocket_flow_core::{Payload, StreamId};
use std::fmt;
use std::sync::{Arc, Weak};

/// The [Subscription] of a stream's response subscriber.
#[derive(Clone)]
pub struct ConsumerHandle {
    id: StreamId,
    conn: Weak<Shared>,
}

impl ConsumerHandle {
    pub(crate) fn new(id: StreamId, conn: Weak<Shared>) -> Self {
        Self { id, conn }
    }

    #[inline]
    pub fn stream_id(&self) -> StreamId {
        self.id
    }
}

impl Subscription for ConsumerHandle {
    fn request(&self, n: i64) {
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, |sm, ctx| sm.request(n, ctx));
        }
    }

    fn cancel(&self) {
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, |sm, ctx| sm.cancel(ctx));
        }
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConsumerHandle(stream={})", self.id)
    }
}

/// The [Subscriber] of the items the application sends on a channel.
///
/// The application subscribes it to its producer, the remote's REQUEST_N frames are forwarded
/// to the producer's subscription.
#[derive(Clone)]
pub struct ProducerHandle {
    id: StreamId,
    conn: Weak<Shared>,
}

impl ProducerHandle {
    pub(crate) fn new(id: StreamId, conn: Weak<Shared>) -> Self {
        Self { id, conn }
    }

    #[inline]
    pub fn stream_id(&self) -> StreamId {
        self.id
    }
}

impl Subscriber for ProducerHandle {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        let mut pending = Some(subscription);
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, |sm, ctx| {
                if let Some(s) = pending.take() {
                    sm.on_subscribe(s, ctx);
                }
            });
        }
        // nobody left to produce for
        if let Some(s) = pending {
            s.cancel();
        }
    }

    fn on_next(&self, payload: Payload) {
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, move |sm, ctx| sm.on_next(payload, ctx));
        }
    }

    fn on_complete(&self) {
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, |sm, ctx| sm.on_complete(ctx));
        }
    }

    fn on_error(&self, error: StreamError) {
        if let Some(conn) = self.conn.upgrade() {
            conn.with_stream(self.id, move |sm, ctx| sm.on_error(error, ctx));
        }
    }
}

impl fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ProducerHandle(stream={})", self.id)
    }
}
