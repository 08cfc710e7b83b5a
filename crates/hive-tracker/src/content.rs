//! Content index: the many-to-many mapping of peers to content hashes.
//!
//! ## Holder counts
//!
//! `files.node_count` is recomputed from `holdings` inside the same
//! transaction as every holding mutation. A file whose count reaches zero is
//! deleted rather than kept as a tombstone. The count is a summary only:
//! answers given to peers ([`ContentIndex::search`],
//! [`ContentIndex::resolve_download`]) are always filtered through the
//! transport probe.

use std::collections::HashSet;
use std::sync::Arc;

use hive_db::queries::files::{self, FileRow};
use hive_db::queries::holdings;
use hive_types::{DownloadNodes, FileDeclaration, FileHash, PeerId, SearchHit};
use rusqlite::Connection;

use crate::probe::LiveTransportProbe;
use crate::{unix_now, Result, Store};

/// Net effect of a holdings update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldingsChange {
    /// Holdings created by this call.
    pub added: usize,
    /// Holdings deleted by this call.
    pub removed: usize,
}

/// Answer to a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Found(DownloadNodes),
    /// A file record exists but none of its holders is reachable.
    NoHolders,
    /// No file record for the hash.
    NotFound,
}

#[derive(Clone)]
pub struct ContentIndex {
    db: Store,
    probe: Arc<dyn LiveTransportProbe>,
}

impl ContentIndex {
    pub fn new(db: Store, probe: Arc<dyn LiveTransportProbe>) -> Self {
        Self { db, probe }
    }

    /// Make `declarations` the peer's complete holding set.
    ///
    /// Hashes not yet held are added, hashes held but absent from the list
    /// are removed, and every touched file's holder count is recomputed.
    /// Calling this repeatedly with the same list changes nothing.
    pub async fn register_holdings(
        &self,
        peer: &PeerId,
        declarations: &[FileDeclaration],
    ) -> Result<HoldingsChange> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction()?;
        let change = replace_holdings_in(&tx, peer, declarations, unix_now())?;
        tx.commit()?;
        Ok(change)
    }

    /// Remove the named holdings. Returns how many existed.
    pub async fn unregister_holdings(&self, peer: &PeerId, hashes: &[FileHash]) -> Result<usize> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction()?;
        let now = unix_now();
        let mut removed = 0;
        for hash in hashes {
            if holdings::delete(&tx, peer.as_str(), hash.as_str())? {
                removed += 1;
            }
            recompute_holder_count(&tx, hash.as_str(), now)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Remove every holding of the peer. Returns how many existed.
    pub async fn purge_all_holdings(&self, peer: &PeerId) -> Result<usize> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction()?;
        let removed = purge_holdings_in(&tx, peer, unix_now())?;
        tx.commit()?;
        Ok(removed)
    }

    /// Find files by exact hash or by case-insensitive name substring.
    ///
    /// A query that is a 64-character hex digest (after trimming and
    /// lowercasing) is an exact lookup and yields at most one hit. Files
    /// without a reachable holder are never returned.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let exact = FileHash::is_hash_like(&needle);

        let candidates = {
            let conn = self.db.lock().await;
            let rows: Vec<FileRow> = if exact {
                files::find(&conn, &needle)?.into_iter().collect()
            } else {
                files::search_by_name(&conn, &needle)?
            };
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let holders = holdings::list_flagged_active_holders(&conn, &row.file_hash)?;
                out.push((row, holders));
            }
            out
        };

        let mut hits = Vec::new();
        for (row, holders) in candidates {
            let nodes = self.reachable(holders)?;
            if nodes.is_empty() {
                continue;
            }
            hits.push(SearchHit {
                hash: FileHash::parse(&row.file_hash)?,
                file_name: row.file_name,
                file_size: row.file_size,
                node_count: nodes.len(),
                nodes,
                is_exact_match: exact,
            });
        }
        Ok(hits)
    }

    /// Resolve a hash to the peers a downloader can contact.
    ///
    /// The lookup is case-insensitive; the reply carries `requested` as sent.
    pub async fn resolve_download(&self, requested: &str) -> Result<DownloadOutcome> {
        let Ok(hash) = FileHash::parse(requested.trim()) else {
            return Ok(DownloadOutcome::NotFound);
        };

        let (row, holders) = {
            let conn = self.db.lock().await;
            let Some(row) = files::find(&conn, hash.as_str())? else {
                return Ok(DownloadOutcome::NotFound);
            };
            let holders = holdings::list_flagged_active_holders(&conn, hash.as_str())?;
            (row, holders)
        };

        let nodes = self.reachable(holders)?;
        if nodes.is_empty() {
            return Ok(DownloadOutcome::NoHolders);
        }
        Ok(DownloadOutcome::Found(DownloadNodes {
            file_hash: requested.to_string(),
            file_name: row.file_name,
            file_size: row.file_size,
            node_count: nodes.len(),
            nodes,
        }))
    }

    /// Hashes the peer currently declares.
    pub async fn holdings_of(&self, peer: &PeerId) -> Result<Vec<FileHash>> {
        let conn = self.db.lock().await;
        let hashes = holdings::list_for_node(&conn, peer.as_str())?;
        Ok(hashes
            .iter()
            .map(|h| FileHash::parse(h))
            .collect::<std::result::Result<_, _>>()?)
    }

    /// Stored file record for a hash.
    pub async fn file(&self, hash: &FileHash) -> Result<Option<FileRow>> {
        let conn = self.db.lock().await;
        Ok(files::find(&conn, hash.as_str())?)
    }

    /// Holder ids whose transport session is live right now.
    fn reachable(&self, holders: Vec<String>) -> Result<Vec<PeerId>> {
        let mut live = Vec::with_capacity(holders.len());
        for id in holders {
            let peer = PeerId::new(id)?;
            if self.probe.is_live(&peer) {
                live.push(peer);
            }
        }
        Ok(live)
    }
}

/// Full-replace of a peer's holding set. Must run inside a transaction.
fn replace_holdings_in(
    conn: &Connection,
    peer: &PeerId,
    declarations: &[FileDeclaration],
    now: u64,
) -> Result<HoldingsChange> {
    let node = peer.as_str();
    let mut change = HoldingsChange::default();
    let mut declared: HashSet<&str> = HashSet::with_capacity(declarations.len());

    for decl in declarations {
        let hash = decl.hash.as_str();
        if holdings::insert_if_absent(conn, node, hash, now)? {
            change.added += 1;
        }
        files::upsert(conn, hash, &decl.name, decl.size, now)?;
        if declared.insert(hash) {
            recompute_holder_count(conn, hash, now)?;
        }
    }

    for held in holdings::list_for_node(conn, node)? {
        if declared.contains(held.as_str()) {
            continue;
        }
        holdings::delete(conn, node, &held)?;
        recompute_holder_count(conn, &held, now)?;
        change.removed += 1;
    }

    Ok(change)
}

/// Drop all of a peer's holdings and fix up the counts they fed.
pub(crate) fn purge_holdings_in(conn: &Connection, peer: &PeerId, now: u64) -> Result<usize> {
    let hashes = holdings::delete_all_for_node(conn, peer.as_str())?;
    for hash in &hashes {
        recompute_holder_count(conn, hash, now)?;
    }
    Ok(hashes.len())
}

/// Set a file's holder count from `holdings`, deleting the file at zero.
fn recompute_holder_count(conn: &Connection, hash: &str, now: u64) -> Result<u64> {
    let count = holdings::count_for_file(conn, hash)?;
    if count == 0 {
        files::delete(conn, hash)?;
    } else {
        files::set_node_count(conn, hash, count, now)?;
    }
    Ok(count)
}
