use bytes::{Bytes, BytesMut};
use std::fmt;

/// The data and optional metadata carried by one logical stream item.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub data: Bytes,
    pub metadata: Option<Bytes>,
}

impl Payload {
    #[inline]
    pub fn new(data: impl Into<Bytes>, metadata: Option<Bytes>) -> Self {
        Self { data: data.into(), metadata }
    }

    /// A payload carries nothing when data is empty and metadata is absent.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.metadata.is_none()
    }

    #[inline]
    pub fn data_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Concatenate a following fragment onto this payload.
    pub fn append(&mut self, other: Payload) {
        if self.data.is_empty() {
            self.data = other.data;
        } else if !other.data.is_empty() {
            let mut buf = BytesMut::with_capacity(self.data.len() + other.data.len());
            buf.extend_from_slice(&self.data);
            buf.extend_from_slice(&other.data);
            self.data = buf.freeze();
        }
        self.metadata = match (self.metadata.take(), other.metadata) {
            (None, m) | (m, None) => m,
            (Some(a), Some(b)) => {
                let mut buf = BytesMut::with_capacity(a.len() + b.len());
                buf.extend_from_slice(&a);
                buf.extend_from_slice(&b);
                Some(buf.freeze())
            }
        };
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.metadata {
            Some(m) => write!(f, "Payload(data={}B, metadata={}B)", self.data.len(), m.len()),
            None => write!(f, "Payload(data={}B)", self.data.len()),
        }
    }
}

impl From<&'static str> for Payload {
    #[inline]
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()), None)
    }
}

impl From<String> for Payload {
    #[inline]
    fn from(s: String) -> Self {
        Self::new(s, None)
    }
}

impl From<Vec<u8>> for Payload {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Self::new(v, None)
    }
}

impl From<Bytes> for Payload {
    #[inline]
    fn from(b: Bytes) -> Self {
        Self::new(b, None)
    }
}
