//! Reassembly of payloads split across several frames.

use rsocket_flow_core::Payload;

/// Accumulates fragments until the frame without the "follows" flag arrives.
#[derive(Debug, Default)]
pub struct PayloadFragments {
    payload: Option<Payload>,
    flags_next: bool,
    flags_complete: bool,
}

impl PayloadFragments {
    pub fn add_payload(&mut self, payload: Payload, flags_next: bool, flags_complete: bool) {
        self.flags_next |= flags_next;
        self.flags_complete |= flags_complete;
        match self.payload.as_mut() {
            Some(p) => p.append(payload),
            None => self.payload = Some(payload),
        }
    }

    /// Take out the reassembled payload with its net next/complete flags, and reset.
    pub fn consume_payload_and_flags(&mut self) -> (Payload, bool, bool) {
        let payload = self.payload.take().unwrap_or_default();
        let flags = (std::mem::take(&mut self.flags_next), std::mem::take(&mut self.flags_complete));
        (payload, flags.0, flags.1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }
}
