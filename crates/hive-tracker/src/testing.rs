//! In-memory transport for exercising the tracker without sockets.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use hive_types::events::OutboundEvent;
use hive_types::PeerId;

use crate::probe::{Delivery, LiveTransportProbe, PeerSink};

/// Session table double: a set of live peers plus a log of every event
/// delivered to each of them.
#[derive(Default)]
pub struct FakeTransport {
    live: Mutex<HashSet<PeerId>>,
    stalled: Mutex<HashSet<PeerId>>,
    outbox: Mutex<HashMap<PeerId, Vec<OutboundEvent>>>,
}

impl FakeTransport {
    /// Mark a session as live.
    pub fn open(&self, peer: &PeerId) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.clone());
    }

    /// Drop a session without telling the tracker, as a crash would.
    pub fn close(&self, peer: &PeerId) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer);
    }

    /// Make a live session refuse further events, as a full queue would.
    pub fn stall(&self, peer: &PeerId) {
        self.stalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.clone());
    }

    /// Events delivered to a peer so far, oldest first.
    pub fn delivered(&self, peer: &PeerId) -> Vec<OutboundEvent> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of events delivered to anyone.
    pub fn delivered_total(&self) -> usize {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl LiveTransportProbe for FakeTransport {
    fn is_live(&self, peer: &PeerId) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(peer)
    }
}

impl PeerSink for FakeTransport {
    fn deliver(&self, peer: &PeerId, event: OutboundEvent) -> Delivery {
        if !self.is_live(peer) {
            return Delivery::NoSession;
        }
        if self
            .stalled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(peer)
        {
            return Delivery::Dropped;
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(peer.clone())
            .or_default()
            .push(event);
        Delivery::Sent
    }
}
