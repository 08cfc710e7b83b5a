//! # hive-tracker
//!
//! Presence, content index, signal relay and reconciliation for the hive
//! signaling service.
//!
//! The tracker keeps two independently changing truths consistent: the
//! persisted peer/holding tables and the set of live transport sessions.
//! The transport is reached only through the [`LiveTransportProbe`] and
//! [`PeerSink`] capabilities, so nothing here knows how sessions are carried.
//!
//! ## Components
//!
//! - [`presence::PresenceDirectory`]: peer rows and their liveness flag
//! - [`content::ContentIndex`]: holdings, file records, search, download lookup
//! - [`relay::SignalRelay`]: opaque signal forwarding between live sessions
//! - [`reconcile::Reconciler`]: purge path plus startup/periodic sweeps
//! - [`dispatch::Dispatcher`]: per-session state machine over inbound events
//!
//! ## Atomicity
//!
//! The store is one SQLite connection behind an async mutex. Every
//! operation that touches more than one row takes the lock once and runs in
//! a single transaction, so a dispatcher purge and a sweep purge of the same
//! peer serialize and the second one finds nothing left to do.

pub mod content;
pub mod dispatch;
pub mod presence;
pub mod probe;
pub mod reconcile;
pub mod relay;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use hive_db::DbError;
use hive_types::TypesError;

pub use content::{ContentIndex, DownloadOutcome};
pub use dispatch::{Dispatcher, Session, SessionState};
pub use presence::PresenceDirectory;
pub use probe::{Delivery, LiveTransportProbe, PeerSink};
pub use reconcile::{PurgeOutcome, Reconciler, SweepReport};
pub use relay::SignalRelay;

/// Shared handle to the single store connection.
pub type Store = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// Wrap an opened connection as a [`Store`].
pub fn store(conn: rusqlite::Connection) -> Store {
    Arc::new(tokio::sync::Mutex::new(conn))
}

/// Tracker error types.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("corrupt stored value: {0}")]
    Corrupt(#[from] TypesError),
}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(e))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// All tracker components wired to one store and one transport.
#[derive(Clone)]
pub struct Tracker {
    pub presence: PresenceDirectory,
    pub content: ContentIndex,
    pub relay: SignalRelay,
    pub reconciler: Reconciler,
    pub dispatcher: Dispatcher,
}

impl Tracker {
    pub fn new(db: Store, probe: Arc<dyn LiveTransportProbe>, sink: Arc<dyn PeerSink>) -> Self {
        let presence = PresenceDirectory::new(db.clone(), probe.clone());
        let content = ContentIndex::new(db.clone(), probe);
        let relay = SignalRelay::new(sink);
        let reconciler = Reconciler::new(db, presence.clone());
        let dispatcher = Dispatcher::new(
            presence.clone(),
            content.clone(),
            relay.clone(),
            reconciler.clone(),
        );
        Self {
            presence,
            content,
            relay,
            reconciler,
            dispatcher,
        }
    }
}
