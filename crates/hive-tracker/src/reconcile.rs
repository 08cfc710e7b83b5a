//! Reconciliation of stored liveness against live transport sessions.
//!
//! Two sweeps share one purge path with the dispatcher's disconnect
//! handling:
//!
//! 1. **Startup**: every peer still flagged active was left behind by a
//!    previous process and is purged unconditionally. Must finish before the
//!    transport accepts connections.
//! 2. **Periodic**: a flagged-active peer without a live session lost its
//!    connection without a disconnect notification and is purged.
//!
//! Each purge is a single transaction, so stopping the loop between purges
//! never leaves a peer half-cleaned.

use std::time::Duration;

use hive_types::PeerId;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::presence::{self, PresenceDirectory};
use crate::{content, unix_now, Result, Store};

/// Default period between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// What a single purge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Holdings removed.
    pub released: usize,
    /// Whether the peer's flag went from active to inactive.
    pub deactivated: bool,
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Peers flagged active when the sweep started.
    pub examined: usize,
    pub purged: usize,
    /// Purges abandoned because the store rejected them.
    pub failed: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    db: Store,
    presence: PresenceDirectory,
}

impl Reconciler {
    pub fn new(db: Store, presence: PresenceDirectory) -> Self {
        Self { db, presence }
    }

    /// Drop all of a peer's holdings and clear its liveness flag, atomically.
    ///
    /// The peer row is kept. Purging a peer that is already inactive with no
    /// holdings succeeds and changes nothing.
    pub async fn purge(&self, peer: &PeerId) -> Result<PurgeOutcome> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction()?;
        let now = unix_now();
        let released = content::purge_holdings_in(&tx, peer, now)?;
        let deactivated = presence::deactivate_in(&tx, peer, now)?;
        tx.commit()?;
        Ok(PurgeOutcome {
            released,
            deactivated,
        })
    }

    /// Purge every peer flagged active. Run once, before accepting sessions.
    pub async fn startup_sweep(&self) -> Result<SweepReport> {
        let stale = self.presence.list_nominally_active().await?;
        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };
        if stale.is_empty() {
            info!("Startup sweep: no peers left active by a previous run");
            return Ok(report);
        }

        let ids: Vec<&str> = stale.iter().map(PeerId::as_str).collect();
        info!(count = stale.len(), peers = ?ids, "Startup sweep: resetting stale peers");
        for peer in &stale {
            self.purge_counted(peer, &mut report).await;
        }
        info!(purged = report.purged, failed = report.failed, "Startup sweep complete");
        Ok(report)
    }

    /// Purge flagged-active peers whose transport session is gone.
    pub async fn periodic_sweep(&self) -> Result<SweepReport> {
        let candidates = self.presence.list_nominally_active().await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for peer in &candidates {
            if self.presence.is_live_transport(peer) {
                continue;
            }
            warn!(peer = %peer, "Peer flagged active but session is gone, purging");
            self.purge_counted(peer, &mut report).await;
        }

        if report.purged > 0 || report.failed > 0 {
            info!(
                purged = report.purged,
                failed = report.failed,
                "Periodic sweep removed disconnected peers"
            );
        }
        Ok(report)
    }

    /// Run [`Self::periodic_sweep`] every `every` until `shutdown` fires.
    ///
    /// The first sweep happens one full interval after the call, since the
    /// startup sweep has just run.
    pub async fn run_periodic(&self, every: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.periodic_sweep().await {
                        error!("Periodic sweep failed: {}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Reconciliation loop stopped");
                    break;
                }
            }
        }
    }

    async fn purge_counted(&self, peer: &PeerId, report: &mut SweepReport) {
        match self.purge(peer).await {
            Ok(outcome) => {
                report.purged += 1;
                info!(peer = %peer, released = outcome.released, "Peer purged");
            }
            Err(e) => {
                report.failed += 1;
                error!(peer = %peer, "Purge failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::content::ContentIndex;
    use crate::testing::FakeTransport;
    use hive_types::{FileDeclaration, FileHash};

    struct Fixture {
        db: Store,
        presence: PresenceDirectory,
        content: ContentIndex,
        reconciler: Reconciler,
        transport: Arc<FakeTransport>,
    }

    impl Fixture {
        fn new() -> Self {
            let db = crate::store(hive_db::open_memory().expect("open db"));
            let transport = Arc::new(FakeTransport::default());
            let presence = PresenceDirectory::new(db.clone(), transport.clone());
            let content = ContentIndex::new(db.clone(), transport.clone());
            let reconciler = Reconciler::new(db.clone(), presence.clone());
            Self {
                db,
                presence,
                content,
                reconciler,
                transport,
            }
        }

        /// Register a peer holding one file, with a live session.
        async fn peer_with_file(&self, id: &str, fill: char) -> PeerId {
            let peer = PeerId::new(id).expect("peer id");
            self.transport.open(&peer);
            self.presence.register(&peer, "10.0.0.1").await.expect("register");
            let decl = FileDeclaration {
                hash: FileHash::parse(&fill.to_string().repeat(64)).expect("hash"),
                name: format!("{id}.bin"),
                size: 1,
            };
            self.content
                .register_holdings(&peer, &[decl])
                .await
                .expect("holdings");
            peer
        }

        async fn is_flagged_active(&self, peer: &PeerId) -> bool {
            self.presence
                .get(peer)
                .await
                .expect("get")
                .map(|row| row.active)
                .unwrap_or(false)
        }
    }

    #[tokio::test]
    async fn test_purge_clears_holdings_and_flag() {
        let fx = Fixture::new();
        let a = fx.peer_with_file("A", 'a').await;

        let outcome = fx.reconciler.purge(&a).await.expect("purge");
        assert_eq!(outcome, PurgeOutcome { released: 1, deactivated: true });
        assert!(!fx.is_flagged_active(&a).await);
        assert!(fx.content.holdings_of(&a).await.expect("holdings").is_empty());
        let hash = FileHash::parse(&"a".repeat(64)).expect("hash");
        assert!(fx.content.file(&hash).await.expect("file").is_none());
        assert!(fx.presence.get(&a).await.expect("get").is_some(), "row is kept");

        let again = fx.reconciler.purge(&a).await.expect("second purge");
        assert_eq!(again, PurgeOutcome::default());
    }

    #[tokio::test]
    async fn test_failed_purge_rolls_back() {
        let fx = Fixture::new();
        let a = fx.peer_with_file("A", 'a').await;
        let b = fx.peer_with_file("B", 'a').await;
        {
            // Deactivation runs after the holdings are already deleted
            let conn = fx.db.lock().await;
            conn.execute_batch(
                "CREATE TRIGGER pin_a BEFORE UPDATE OF active ON peers
                 WHEN OLD.node_id = 'A' AND NEW.active = 0
                 BEGIN SELECT RAISE(ABORT, 'pinned'); END;",
            )
            .expect("trigger");
        }

        let result = fx.reconciler.purge(&a).await;
        assert!(matches!(result, Err(crate::TrackerError::Store(_))));

        let hash = FileHash::parse(&"a".repeat(64)).expect("hash");
        assert_eq!(fx.content.holdings_of(&a).await.expect("holdings"), vec![hash.clone()]);
        let record = fx.content.file(&hash).await.expect("file").expect("record");
        assert_eq!(record.node_count, 2);
        assert!(fx.is_flagged_active(&a).await);

        // Other peers are unaffected and the sweep counts the failure
        fx.transport.close(&a);
        fx.transport.close(&b);
        let report = fx.reconciler.periodic_sweep().await.expect("sweep");
        assert_eq!(report, SweepReport { examined: 2, purged: 1, failed: 1 });
        let record = fx.content.file(&hash).await.expect("file").expect("record");
        assert_eq!(record.node_count, 1);
        assert!(!fx.is_flagged_active(&b).await);
    }

    #[tokio::test]
    async fn test_purge_unknown_peer_succeeds() {
        let fx = Fixture::new();
        let ghost = PeerId::new("ghost").expect("peer id");
        assert_eq!(fx.reconciler.purge(&ghost).await.expect("purge"), PurgeOutcome::default());
    }

    #[tokio::test]
    async fn test_concurrent_purges_of_same_peer() {
        let fx = Fixture::new();
        let a = fx.peer_with_file("A", 'a').await;

        let (first, second) = tokio::join!(fx.reconciler.purge(&a), fx.reconciler.purge(&a));
        let first = first.expect("first");
        let second = second.expect("second");
        assert_eq!(first.released + second.released, 1);
        assert!(first.deactivated ^ second.deactivated);
    }

    #[tokio::test]
    async fn test_startup_sweep_purges_everything_flagged() {
        let fx = Fixture::new();
        let a = fx.peer_with_file("A", 'a').await;
        let b = fx.peer_with_file("B", 'b').await;
        // A session for B happens to exist; startup ignores it

        fx.transport.close(&a);

        let report = fx.reconciler.startup_sweep().await.expect("sweep");
        assert_eq!(report, SweepReport { examined: 2, purged: 2, failed: 0 });
        assert!(!fx.is_flagged_active(&a).await);
        assert!(!fx.is_flagged_active(&b).await);
        assert!(fx.content.holdings_of(&b).await.expect("holdings").is_empty());
    }

    #[tokio::test]
    async fn test_startup_sweep_on_clean_store() {
        let fx = Fixture::new();
        let report = fx.reconciler.startup_sweep().await.expect("sweep");
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_periodic_sweep_spares_live_peers() {
        let fx = Fixture::new();
        let live = fx.peer_with_file("live", 'a').await;
        let crashed = fx.peer_with_file("crashed", 'b').await;
        fx.transport.close(&crashed);

        let report = fx.reconciler.periodic_sweep().await.expect("sweep");
        assert_eq!(report, SweepReport { examined: 2, purged: 1, failed: 0 });

        assert!(fx.is_flagged_active(&live).await);
        assert_eq!(fx.content.holdings_of(&live).await.expect("holdings").len(), 1);
        assert!(!fx.is_flagged_active(&crashed).await);
        assert!(fx.content.holdings_of(&crashed).await.expect("holdings").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_sweeps_until_shutdown() {
        let fx = Fixture::new();
        let crashed = fx.peer_with_file("crashed", 'b').await;
        fx.transport.close(&crashed);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let reconciler = fx.reconciler.clone();
        let handle = tokio::spawn(async move {
            reconciler.run_periodic(DEFAULT_SWEEP_INTERVAL, shutdown_rx).await;
        });

        time::sleep(Duration::from_secs(10)).await;
        assert!(fx.is_flagged_active(&crashed).await, "no sweep before first interval");

        time::sleep(DEFAULT_SWEEP_INTERVAL).await;
        assert!(!fx.is_flagged_active(&crashed).await);

        shutdown_tx.send(()).expect("send shutdown");
        handle.await.expect("loop exits");
    }
}
