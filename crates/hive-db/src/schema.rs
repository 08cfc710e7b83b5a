//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Peers: every session the server has seen. Rows are never
-- deleted; `active` is a cache of transport liveness.
-- ============================================================

CREATE TABLE IF NOT EXISTS peers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id TEXT NOT NULL UNIQUE,
    active INTEGER NOT NULL DEFAULT 1,
    last_heartbeat INTEGER NOT NULL,
    ip_address TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_peers_active ON peers(active);

-- ============================================================
-- Files: one row per hash with at least one holder.
-- node_count mirrors COUNT(holdings) for the hash.
-- ============================================================

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_hash TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL,
    -- Unicode-folded file_name; SQLite's lower() folds ASCII only
    file_name_folded TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    node_count INTEGER NOT NULL DEFAULT 0,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

-- ============================================================
-- Holdings: which peer currently declares which hash.
-- ============================================================

CREATE TABLE IF NOT EXISTS holdings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id TEXT NOT NULL REFERENCES peers(node_id),
    file_hash TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    UNIQUE (node_id, file_hash)
);

CREATE INDEX IF NOT EXISTS idx_holdings_hash ON holdings(file_hash);
"#;
