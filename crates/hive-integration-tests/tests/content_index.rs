//! Integration test: content index properties under mixed traffic.
//!
//! Several peers register, re-register, unregister and disconnect through
//! the dispatcher; after every step the stored holder counts must equal the
//! number of peers declaring each hash.

use std::collections::BTreeMap;
use std::sync::Arc;

use hive_tracker::testing::FakeTransport;
use hive_tracker::{Session, Tracker};
use hive_types::events::{InboundEvent, OutboundEvent};
use hive_types::{
    DownloadMiss, FileDeclaration, FileHash, PeerId, ERR_FILE_NOT_INDEXED, ERR_NO_ACTIVE_HOLDERS,
};

fn hash(fill: char) -> FileHash {
    FileHash::parse(&fill.to_string().repeat(64)).expect("hash")
}

fn decl(fill: char) -> FileDeclaration {
    FileDeclaration {
        hash: hash(fill),
        name: format!("file-{fill}.bin"),
        size: 100,
    }
}

struct World {
    tracker: Tracker,
    transport: Arc<FakeTransport>,
    sessions: Vec<Session>,
}

impl World {
    fn new() -> Self {
        let db = hive_tracker::store(hive_db::open_memory().expect("open db"));
        let transport = Arc::new(FakeTransport::default());
        let tracker = Tracker::new(db, transport.clone(), transport.clone());
        Self {
            tracker,
            transport,
            sessions: Vec::new(),
        }
    }

    async fn connect(&mut self, id: &str) -> usize {
        let peer = PeerId::new(id).expect("peer id");
        self.transport.open(&peer);
        self.sessions.push(self.tracker.dispatcher.connect(peer, "203.0.113.5").await);
        self.sessions.len() - 1
    }

    async fn send(&self, who: usize, event: InboundEvent) -> Option<OutboundEvent> {
        self.tracker.dispatcher.handle(&self.sessions[who], event).await
    }

    async fn disconnect(&mut self, who: usize) {
        self.transport.close(self.sessions[who].peer());
        self.tracker.dispatcher.disconnect(&mut self.sessions[who]).await;
    }

    /// Check stored holder counts against the declared holdings of every peer.
    async fn assert_counts_consistent(&self, universe: &[char]) {
        let mut expected: BTreeMap<FileHash, u64> = BTreeMap::new();
        for session in &self.sessions {
            for h in self.tracker.content.holdings_of(session.peer()).await.expect("holdings") {
                *expected.entry(h).or_default() += 1;
            }
        }
        for &fill in universe {
            let h = hash(fill);
            let stored = self.tracker.content.file(&h).await.expect("file");
            match expected.get(&h) {
                Some(&n) => {
                    let record = stored.unwrap_or_else(|| panic!("record for {h} missing"));
                    assert_eq!(record.node_count, n, "count for {h}");
                }
                None => assert!(stored.is_none(), "record for {h} should be gone"),
            }
        }
    }
}

#[tokio::test]
async fn holder_counts_track_every_mutation() {
    let universe = ['a', 'b', 'c', 'd'];
    let mut w = World::new();
    let p0 = w.connect("p0").await;
    let p1 = w.connect("p1").await;
    let p2 = w.connect("p2").await;

    w.send(p0, InboundEvent::RegisterFiles(vec![decl('a'), decl('b')])).await;
    w.assert_counts_consistent(&universe).await;

    w.send(p1, InboundEvent::RegisterFiles(vec![decl('b'), decl('c')])).await;
    w.assert_counts_consistent(&universe).await;

    // Same set again: nothing moves
    w.send(p1, InboundEvent::RegisterFiles(vec![decl('b'), decl('c')])).await;
    w.assert_counts_consistent(&universe).await;
    assert_eq!(w.tracker.content.file(&hash('b')).await.expect("file").expect("b").node_count, 2);

    w.send(p2, InboundEvent::RegisterFiles(vec![decl('c'), decl('c'), decl('d')])).await;
    w.assert_counts_consistent(&universe).await;

    // p0 converges on {c}: a disappears, b drops to one holder
    w.send(p0, InboundEvent::RegisterFiles(vec![decl('c')])).await;
    w.assert_counts_consistent(&universe).await;
    assert!(w.tracker.content.file(&hash('a')).await.expect("file").is_none());
    assert_eq!(w.tracker.content.file(&hash('c')).await.expect("file").expect("c").node_count, 3);

    w.send(p2, InboundEvent::UnregisterFiles(vec![hash('d').to_string()])).await;
    w.assert_counts_consistent(&universe).await;

    w.disconnect(p1).await;
    w.assert_counts_consistent(&universe).await;
    assert!(w.tracker.content.file(&hash('b')).await.expect("file").is_none());

    w.disconnect(p0).await;
    w.disconnect(p2).await;
    w.assert_counts_consistent(&universe).await;
    for fill in universe {
        assert!(w.tracker.content.file(&hash(fill)).await.expect("file").is_none());
    }
}

#[tokio::test]
async fn search_never_reports_unreachable_files() {
    let mut w = World::new();
    let seeder = w.connect("seeder").await;
    let leecher = w.connect("leecher").await;

    w.send(seeder, InboundEvent::RegisterFiles(vec![decl('a'), decl('b')])).await;

    // Seeder's socket dies; no disconnect event yet
    w.transport.close(w.sessions[seeder].peer());

    let reply = w.send(leecher, InboundEvent::SearchFiles("file-".into())).await;
    assert_eq!(reply, Some(OutboundEvent::SearchResults(Vec::new())));

    let reply = w.send(leecher, InboundEvent::SearchFiles(hash('a').to_string())).await;
    assert_eq!(reply, Some(OutboundEvent::SearchResults(Vec::new())));
}

#[tokio::test]
async fn download_distinguishes_unknown_from_unreachable() {
    let mut w = World::new();
    let seeder = w.connect("seeder").await;
    let leecher = w.connect("leecher").await;
    w.send(seeder, InboundEvent::RegisterFiles(vec![decl('a')])).await;

    let unknown = w.send(leecher, InboundEvent::RequestDownload(hash('f').to_string())).await;
    assert_eq!(
        unknown,
        Some(OutboundEvent::DownloadNodesNotFound(DownloadMiss {
            file_hash: hash('f').to_string(),
            error: ERR_FILE_NOT_INDEXED.to_string(),
        }))
    );

    w.transport.close(w.sessions[seeder].peer());
    let unreachable = w.send(leecher, InboundEvent::RequestDownload(hash('a').to_string())).await;
    assert_eq!(
        unreachable,
        Some(OutboundEvent::DownloadNodesNotFound(DownloadMiss {
            file_hash: hash('a').to_string(),
            error: ERR_NO_ACTIVE_HOLDERS.to_string(),
        }))
    );

    // Once purged, the record is gone and the answer changes
    w.disconnect(seeder).await;
    let gone = w.send(leecher, InboundEvent::RequestDownload(hash('a').to_string())).await;
    let Some(OutboundEvent::DownloadNodesNotFound(miss)) = gone else {
        panic!("expected download-nodes-not-found");
    };
    assert_eq!(miss.error, ERR_FILE_NOT_INDEXED);
}

#[tokio::test]
async fn purge_twice_is_harmless() {
    let mut w = World::new();
    let p = w.connect("p").await;
    w.send(p, InboundEvent::RegisterFiles(vec![decl('a')])).await;

    let peer = w.sessions[p].peer().clone();
    let first = w.tracker.reconciler.purge(&peer).await.expect("purge");
    let second = w.tracker.reconciler.purge(&peer).await.expect("purge again");
    assert_eq!(first.released, 1);
    assert!(first.deactivated);
    assert_eq!(second.released, 0);
    assert!(!second.deactivated);

    // The dispatcher's own disconnect afterwards also succeeds
    w.disconnect(p).await;
    assert!(w.tracker.presence.list_nominally_active().await.expect("list").is_empty());
}
