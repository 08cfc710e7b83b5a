//! Presence directory: the peer table and its liveness flag.

use std::sync::Arc;

use hive_db::queries::peers::{self, PeerRow};
use hive_db::DbError;
use hive_types::PeerId;
use rusqlite::Connection;
use tracing::debug;

use crate::probe::LiveTransportProbe;
use crate::{unix_now, Result, Store};

/// Authoritative record of which peers exist and which are believed live.
#[derive(Clone)]
pub struct PresenceDirectory {
    db: Store,
    probe: Arc<dyn LiveTransportProbe>,
}

impl PresenceDirectory {
    pub fn new(db: Store, probe: Arc<dyn LiveTransportProbe>) -> Self {
        Self { db, probe }
    }

    /// Create or reactivate a peer row. Idempotent.
    pub async fn register(&self, peer: &PeerId, remote_addr: &str) -> Result<()> {
        let conn = self.db.lock().await;
        peers::upsert_active(&conn, peer.as_str(), remote_addr, unix_now())?;
        Ok(())
    }

    /// Refresh a peer's heartbeat. Unknown peers are ignored; returns whether
    /// a row was updated.
    pub async fn heartbeat(&self, peer: &PeerId) -> Result<bool> {
        let conn = self.db.lock().await;
        let known = peers::touch_heartbeat(&conn, peer.as_str(), unix_now())?;
        if !known {
            debug!(peer = %peer, "heartbeat from unknown peer dropped");
        }
        Ok(known)
    }

    /// Clear a peer's liveness flag. The row itself is kept.
    pub async fn deactivate(&self, peer: &PeerId) -> Result<bool> {
        let conn = self.db.lock().await;
        deactivate_in(&conn, peer, unix_now())
    }

    /// Ask the transport whether the peer has a live session.
    pub fn is_live_transport(&self, peer: &PeerId) -> bool {
        self.probe.is_live(peer)
    }

    /// Peers whose stored flag says active. Candidates for reconciliation,
    /// not a statement about who is connected.
    pub async fn list_nominally_active(&self) -> Result<Vec<PeerId>> {
        let conn = self.db.lock().await;
        let ids = peers::list_active(&conn)?;
        Ok(ids.into_iter().map(PeerId::new).collect::<std::result::Result<_, _>>()?)
    }

    /// Stored row for a peer, if any.
    pub async fn get(&self, peer: &PeerId) -> Result<Option<PeerRow>> {
        let conn = self.db.lock().await;
        match peers::get(&conn, peer.as_str()) {
            Ok(row) => Ok(Some(row)),
            Err(DbError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// [`PresenceDirectory::deactivate`] against a connection the caller already
/// holds, so it can share a transaction with other writes.
pub(crate) fn deactivate_in(conn: &Connection, peer: &PeerId, now: u64) -> Result<bool> {
    Ok(peers::set_inactive(conn, peer.as_str(), now)?)
}
