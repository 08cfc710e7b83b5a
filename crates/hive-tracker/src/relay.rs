//! Signal relay: best-effort forwarding of opaque WebRTC negotiation data.
//!
//! The sender is never told whether the target exists. An unknown, dead or
//! congested target simply does not receive the message.

use std::sync::Arc;

use hive_types::events::{OutboundEvent, RelayedSignal};
use hive_types::PeerId;
use serde_json::Value;
use tracing::debug;

use crate::probe::{Delivery, PeerSink};

#[derive(Clone)]
pub struct SignalRelay {
    sink: Arc<dyn PeerSink>,
}

impl SignalRelay {
    pub fn new(sink: Arc<dyn PeerSink>) -> Self {
        Self { sink }
    }

    /// Forward `signal` unmodified to `to`, tagged with `from`.
    ///
    /// The returned [`Delivery`] is for logging and tests only; it must not
    /// be reported back to the sender.
    pub fn forward(&self, from: &PeerId, to: &PeerId, signal: Value) -> Delivery {
        let event = OutboundEvent::WebrtcSignal(RelayedSignal {
            from_peer_id: from.clone(),
            signal,
        });
        let outcome = self.sink.deliver(to, event);
        match outcome {
            Delivery::Sent => debug!(from = %from, to = %to, "signal relayed"),
            Delivery::NoSession => debug!(from = %from, to = %to, "signal target not connected, dropped"),
            Delivery::Dropped => debug!(from = %from, to = %to, "signal target congested, dropped"),
        }
        outcome
    }
}
