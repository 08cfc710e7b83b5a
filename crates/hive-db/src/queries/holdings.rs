//! Holding (peer declares hash) query functions.

use rusqlite::Connection;

use crate::Result;

/// Record that a peer holds a hash. Returns `false` if it already did.
pub fn insert_if_absent(conn: &Connection, node_id: &str, file_hash: &str, now: u64) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO holdings (node_id, file_hash, create_time) VALUES (?1, ?2, ?3)",
        rusqlite::params![node_id, file_hash, now as i64],
    )?;
    Ok(changed > 0)
}

/// Remove one holding. Returns `false` if it did not exist.
pub fn delete(conn: &Connection, node_id: &str, file_hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM holdings WHERE node_id = ?1 AND file_hash = ?2",
        rusqlite::params![node_id, file_hash],
    )?;
    Ok(changed > 0)
}

/// Remove every holding of a peer, returning the hashes that were held.
pub fn delete_all_for_node(conn: &Connection, node_id: &str) -> Result<Vec<String>> {
    let hashes = list_for_node(conn, node_id)?;
    conn.execute("DELETE FROM holdings WHERE node_id = ?1", [node_id])?;
    Ok(hashes)
}

/// Hashes a peer holds, in registration order.
pub fn list_for_node(conn: &Connection, node_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT file_hash FROM holdings WHERE node_id = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([node_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// Holders of a hash whose peer row is flagged active, in registration order.
///
/// The flag can be stale; callers that answer peers must still check the
/// transport.
pub fn list_flagged_active_holders(conn: &Connection, file_hash: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT h.node_id FROM holdings h
         JOIN peers p ON p.node_id = h.node_id
         WHERE h.file_hash = ?1 AND p.active = 1
         ORDER BY h.id",
    )?;
    let rows = stmt
        .query_map([file_hash], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// Number of holdings for a hash.
pub fn count_for_file(conn: &Connection, file_hash: &str) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM holdings WHERE file_hash = ?1",
        [file_hash],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}
