//! Live session table.
//!
//! Maps each connected peer to the bounded queue drained by its socket
//! writer. Sends never wait: a full queue drops the event.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use hive_tracker::{Delivery, LiveTransportProbe, PeerSink};
use hive_types::events::OutboundEvent;
use hive_types::PeerId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<PeerId, mpsc::Sender<OutboundEvent>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: PeerId, outbound: mpsc::Sender<OutboundEvent>) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, outbound);
    }

    /// Remove a session. Returns `false` if it was not present.
    pub fn remove(&self, peer: &PeerId) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer)
            .is_some()
    }

    /// Number of sessions in the table.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sender(&self, peer: &PeerId) -> Option<mpsc::Sender<OutboundEvent>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
    }
}

impl LiveTransportProbe for SessionTable {
    fn is_live(&self, peer: &PeerId) -> bool {
        self.sender(peer).is_some_and(|tx| !tx.is_closed())
    }
}

impl PeerSink for SessionTable {
    fn deliver(&self, peer: &PeerId, event: OutboundEvent) -> Delivery {
        let Some(tx) = self.sender(peer) else {
            return Delivery::NoSession;
        };
        match tx.try_send(event) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                warn!(peer = %peer, "Outbound queue full, event dropped");
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!(peer = %peer, "session closing, event dropped");
                Delivery::NoSession
            }
        }
    }
}
