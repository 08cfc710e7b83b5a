//! Capabilities the tracker needs from whatever owns live sessions.

use hive_types::events::OutboundEvent;
use hive_types::PeerId;

/// Ground truth for "is this peer connected right now".
///
/// The stored `active` flag is only a cache of this answer; it goes stale
/// between a crash and the next sweep.
pub trait LiveTransportProbe: Send + Sync {
    /// True iff a session with this identifier exists and is writable.
    fn is_live(&self, peer: &PeerId) -> bool;
}

/// Result of handing an event to a peer's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the session's outbound channel.
    Sent,
    /// No live session with that identifier.
    NoSession,
    /// The session exists but its queue is full; the event was discarded.
    Dropped,
}

/// Non-blocking outbound path to a peer.
///
/// Implementations must never wait on the receiving peer: a slow or dead
/// receiver yields [`Delivery::Dropped`] instead of stalling the caller.
pub trait PeerSink: Send + Sync {
    fn deliver(&self, peer: &PeerId, event: OutboundEvent) -> Delivery;
}
