//! Reactive-streams capability traits.
//!
//! A [Subscriber] receives items pushed by a producer after it has been handed a
//! [Subscription], through which it asks for more items or stops the flow.
//! Both are shared as `Arc<dyn _>` and take `&self`, implementors keep their
//! state behind interior mutability.

use crate::{Payload, error::StreamError};
use std::sync::Arc;

pub trait Subscription: Send + Sync {
    /// Ask for `n` more items. Non-positive values are ignored.
    fn request(&self, n: i64);

    fn cancel(&self);
}

pub trait Subscriber: Send + Sync {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    fn on_next(&self, payload: Payload);

    fn on_complete(&self);

    fn on_error(&self, error: StreamError);
}

/// A subscription that ignores every call, handed out for flows that are already finished.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
    #[inline]
    fn request(&self, _n: i64) {}

    #[inline]
    fn cancel(&self) {}
}
