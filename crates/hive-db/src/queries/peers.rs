//! Peer table query functions.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Insert a peer as active, or reactivate an existing row.
///
/// An existing row keeps its `create_time`; address, heartbeat and update
/// time are overwritten.
pub fn upsert_active(conn: &Connection, node_id: &str, ip_address: &str, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO peers (node_id, active, last_heartbeat, ip_address, create_time, update_time)
         VALUES (?1, 1, ?2, ?3, ?2, ?2)
         ON CONFLICT(node_id) DO UPDATE SET
             active = 1,
             last_heartbeat = excluded.last_heartbeat,
             ip_address = excluded.ip_address,
             update_time = excluded.update_time",
        rusqlite::params![node_id, now as i64, ip_address],
    )?;
    Ok(())
}

/// Record a heartbeat. Returns `false` if the peer is unknown.
pub fn touch_heartbeat(conn: &Connection, node_id: &str, now: u64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE peers SET last_heartbeat = ?1, active = 1, update_time = ?1 WHERE node_id = ?2",
        rusqlite::params![now as i64, node_id],
    )?;
    Ok(changed > 0)
}

/// Mark a peer inactive. Returns `false` if the peer is unknown or already
/// inactive, in which case nothing is written.
pub fn set_inactive(conn: &Connection, node_id: &str, now: u64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE peers SET active = 0, update_time = ?1 WHERE node_id = ?2 AND active = 1",
        rusqlite::params![now as i64, node_id],
    )?;
    Ok(changed > 0)
}

/// Get a peer by node id.
pub fn get(conn: &Connection, node_id: &str) -> Result<PeerRow> {
    conn.query_row(
        "SELECT node_id, active, last_heartbeat, ip_address, create_time, update_time
         FROM peers WHERE node_id = ?1",
        [node_id],
        |row| {
            Ok(PeerRow {
                node_id: row.get(0)?,
                active: row.get(1)?,
                last_heartbeat: row.get::<_, i64>(2)? as u64,
                ip_address: row.get(3)?,
                create_time: row.get::<_, i64>(4)? as u64,
                update_time: row.get::<_, i64>(5)? as u64,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("peer '{node_id}'")),
        other => DbError::Sqlite(other),
    })
}

/// Node ids of all peers whose stored flag says active.
pub fn list_active(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT node_id FROM peers WHERE active = 1 ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// A raw peer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRow {
    pub node_id: String,
    pub active: bool,
    pub last_heartbeat: u64,
    pub ip_address: String,
    pub create_time: u64,
    pub update_time: u64,
}
