//! Event dispatcher: the per-session state machine.
//!
//! ```text
//! connected --register ok--> active --transport closed--> disconnected
//!     |                                                       ^
//!     +-----------------------transport closed----------------+
//! ```
//!
//! Only an `active` session has its events applied. Everything else is
//! tolerated and ignored. Store failures are logged and swallowed so one bad
//! event never tears down a session.

use hive_types::events::{InboundEvent, OutboundEvent, SignalRequest};
use hive_types::{
    DownloadMiss, FileDeclaration, FileHash, PeerId, ERR_FILE_NOT_INDEXED, ERR_NO_ACTIVE_HOLDERS,
};
use tracing::{debug, error, info, warn};

use crate::content::{ContentIndex, DownloadOutcome};
use crate::presence::PresenceDirectory;
use crate::reconcile::Reconciler;
use crate::relay::SignalRelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, presence not yet recorded.
    Connected,
    Active,
    /// Terminal.
    Disconnected,
}

/// One transport connection as seen by the tracker.
#[derive(Debug, Clone)]
pub struct Session {
    peer: PeerId,
    remote_addr: String,
    state: SessionState,
}

impl Session {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    presence: PresenceDirectory,
    content: ContentIndex,
    relay: SignalRelay,
    reconciler: Reconciler,
}

impl Dispatcher {
    pub fn new(
        presence: PresenceDirectory,
        content: ContentIndex,
        relay: SignalRelay,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            presence,
            content,
            relay,
            reconciler,
        }
    }

    /// Record a newly accepted connection.
    ///
    /// The returned session is `Active` when the peer row was written. If the
    /// store refused, it stays `Connected` and the caller should close the
    /// transport.
    pub async fn connect(&self, peer: PeerId, remote_addr: impl Into<String>) -> Session {
        let mut session = Session {
            peer,
            remote_addr: remote_addr.into(),
            state: SessionState::Connected,
        };
        match self.presence.register(&session.peer, &session.remote_addr).await {
            Ok(()) => {
                session.state = SessionState::Active;
                info!(peer = %session.peer, addr = %session.remote_addr, "Peer connected");
            }
            Err(e) => error!(peer = %session.peer, "Failed to register peer: {}", e),
        }
        session
    }

    /// Apply one inbound event. Returns the reply for the sender, if any.
    pub async fn handle(&self, session: &Session, event: InboundEvent) -> Option<OutboundEvent> {
        if !session.is_active() {
            debug!(peer = %session.peer, event = event.name(), state = ?session.state, "event on inactive session ignored");
            return None;
        }
        let peer = &session.peer;

        match event {
            InboundEvent::RegisterFiles(declarations) => {
                self.register_files(peer, declarations).await;
                None
            }
            InboundEvent::UnregisterFiles(hashes) => {
                self.unregister_files(peer, hashes).await;
                None
            }
            InboundEvent::SearchFiles(query) => self.search_files(peer, &query).await,
            InboundEvent::RequestDownload(hash) => self.request_download(peer, hash).await,
            InboundEvent::WebrtcSignal(SignalRequest {
                target_peer_id,
                signal,
            }) => {
                self.relay.forward(peer, &target_peer_id, signal);
                None
            }
            InboundEvent::Heartbeat => {
                if let Err(e) = self.presence.heartbeat(peer).await {
                    error!(peer = %peer, "Heartbeat update failed: {}", e);
                }
                Some(OutboundEvent::HeartbeatAck)
            }
        }
    }

    /// Tear down a session: purge the peer and mark the session terminal.
    ///
    /// Calling it again on a disconnected session does nothing.
    pub async fn disconnect(&self, session: &mut Session) {
        if session.state == SessionState::Disconnected {
            return;
        }
        session.state = SessionState::Disconnected;
        match self.reconciler.purge(&session.peer).await {
            Ok(outcome) => info!(
                peer = %session.peer,
                released = outcome.released,
                "Peer disconnected"
            ),
            Err(e) => error!(
                peer = %session.peer,
                "Purge on disconnect failed, left to the periodic sweep: {}", e
            ),
        }
    }

    async fn register_files(&self, peer: &PeerId, declarations: Vec<FileDeclaration>) {
        if declarations.is_empty() {
            debug!(peer = %peer, "empty register-files ignored");
            return;
        }
        match self.content.register_holdings(peer, &declarations).await {
            Ok(change) => info!(
                peer = %peer,
                declared = declarations.len(),
                added = change.added,
                removed = change.removed,
                "Holdings registered"
            ),
            Err(e) => error!(peer = %peer, "Failed to register holdings: {}", e),
        }
    }

    async fn unregister_files(&self, peer: &PeerId, raw: Vec<String>) {
        if raw.is_empty() {
            return;
        }
        let hashes = match raw
            .iter()
            .map(|h| FileHash::parse(h))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(hashes) => hashes,
            Err(e) => {
                warn!(peer = %peer, "Malformed unregister-files dropped: {}", e);
                return;
            }
        };
        match self.content.unregister_holdings(peer, &hashes).await {
            Ok(removed) => info!(peer = %peer, removed, "Holdings unregistered"),
            Err(e) => error!(peer = %peer, "Failed to unregister holdings: {}", e),
        }
    }

    async fn search_files(&self, peer: &PeerId, query: &str) -> Option<OutboundEvent> {
        match self.content.search(query).await {
            Ok(hits) => {
                debug!(peer = %peer, query, hits = hits.len(), "search");
                Some(OutboundEvent::SearchResults(hits))
            }
            Err(e) => {
                error!(peer = %peer, "Search failed: {}", e);
                None
            }
        }
    }

    async fn request_download(&self, peer: &PeerId, hash: String) -> Option<OutboundEvent> {
        let outcome = match self.content.resolve_download(&hash).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(peer = %peer, "Download lookup failed: {}", e);
                return None;
            }
        };
        let reply = match outcome {
            DownloadOutcome::Found(nodes) => OutboundEvent::DownloadNodesFound(nodes),
            DownloadOutcome::NoHolders => OutboundEvent::DownloadNodesNotFound(DownloadMiss {
                file_hash: hash,
                error: ERR_NO_ACTIVE_HOLDERS.to_string(),
            }),
            DownloadOutcome::NotFound => OutboundEvent::DownloadNodesNotFound(DownloadMiss {
                file_hash: hash,
                error: ERR_FILE_NOT_INDEXED.to_string(),
            }),
        };
        Some(reply)
    }
}
