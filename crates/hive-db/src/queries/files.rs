//! File record query functions.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const FILE_COLUMNS: &str =
    "file_hash, file_name, file_size, node_count, create_time, update_time";

/// Create a file record, or refresh `update_time` if one exists.
///
/// Name and size come from the first registrant and are never overwritten.
/// Returns `true` if a new row was created.
pub fn upsert(conn: &Connection, file_hash: &str, file_name: &str, file_size: u64, now: u64) -> Result<bool> {
    let existed = find(conn, file_hash)?.is_some();
    conn.execute(
        "INSERT INTO files
             (file_hash, file_name, file_name_folded, file_size, node_count, create_time, update_time)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
         ON CONFLICT(file_hash) DO UPDATE SET update_time = excluded.update_time",
        rusqlite::params![file_hash, file_name, fold_name(file_name), file_size as i64, now as i64],
    )?;
    Ok(!existed)
}

/// Look up a file record by hash.
pub fn find(conn: &Connection, file_hash: &str) -> Result<Option<FileRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE file_hash = ?1"),
            [file_hash],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// Case-insensitive substring match on file name, ordered by insertion.
///
/// Both the stored name and `needle` are folded with Unicode lowercasing.
/// `needle` is matched literally: `%`, `_` and `\` carry no pattern meaning.
pub fn search_by_name(conn: &Connection, needle: &str) -> Result<Vec<FileRow>> {
    let pattern = format!("%{}%", escape_like(&fold_name(needle)));
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files
         WHERE file_name_folded LIKE ?1 ESCAPE '\\'
         ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([pattern], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Store a recomputed holder count.
pub fn set_node_count(conn: &Connection, file_hash: &str, node_count: u64, now: u64) -> Result<()> {
    conn.execute(
        "UPDATE files SET node_count = ?1, update_time = ?2 WHERE file_hash = ?3",
        rusqlite::params![node_count as i64, now as i64, file_hash],
    )?;
    Ok(())
}

/// Delete a file record. Returns `false` if none existed.
pub fn delete(conn: &Connection, file_hash: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM files WHERE file_hash = ?1", [file_hash])?;
    Ok(changed > 0)
}

/// Case folding used for name search.
fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        file_hash: row.get(0)?,
        file_name: row.get(1)?,
        file_size: row.get::<_, i64>(2)? as u64,
        node_count: row.get::<_, i64>(3)? as u64,
        create_time: row.get::<_, i64>(4)? as u64,
        update_time: row.get::<_, i64>(5)? as u64,
    })
}

/// A raw file row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub file_hash: String,
    pub file_name: String,
    pub file_size: u64,
    pub node_count: u64,
    pub create_time: u64,
    pub update_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_upsert_keeps_first_name_and_size() {
        let conn = test_db();
        assert!(upsert(&conn, "h1", "first.bin", 10, 100).expect("insert"));
        assert!(!upsert(&conn, "h1", "second.bin", 99, 200).expect("refresh"));

        let row = find(&conn, "h1").expect("find").expect("present");
        assert_eq!(row.file_name, "first.bin");
        assert_eq!(row.file_size, 10);
        assert_eq!(row.create_time, 100);
        assert_eq!(row.update_time, 200);
    }

    #[test]
    fn test_find_missing() {
        let conn = test_db();
        assert!(find(&conn, "nope").expect("find").is_none());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let conn = test_db();
        upsert(&conn, "h1", "Holiday.MP4", 1, 100).expect("h1");
        upsert(&conn, "h2", "notes.txt", 1, 100).expect("h2");
        upsert(&conn, "h3", "holiday-2.mp4", 1, 100).expect("h3");

        let hits = search_by_name(&conn, "HOLIDAY").expect("search");
        let hashes: Vec<_> = hits.iter().map(|r| r.file_hash.as_str()).collect();
        assert_eq!(hashes, vec!["h1", "h3"]);
    }

    #[test]
    fn test_search_folds_non_ascii_names() {
        let conn = test_db();
        upsert(&conn, "h1", "ÉTÉ.mp3", 1, 100).expect("h1");
        upsert(&conn, "h2", "Straße.flac", 1, 100).expect("h2");

        for query in ["été", "ÉTÉ", "Été.MP3"] {
            let hits = search_by_name(&conn, query).expect("search");
            assert_eq!(hits.len(), 1, "query {query}");
            assert_eq!(hits[0].file_name, "ÉTÉ.mp3");
        }
        assert_eq!(search_by_name(&conn, "STRASSE").expect("search").len(), 0);
        assert_eq!(search_by_name(&conn, "STRAẞE").expect("search").len(), 1);
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let conn = test_db();
        upsert(&conn, "h1", "100%_done.txt", 1, 100).expect("h1");
        upsert(&conn, "h2", "1000 done.txt", 1, 100).expect("h2");

        let hits = search_by_name(&conn, "0%_").expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_hash, "h1");

        assert!(search_by_name(&conn, "_").expect("underscore").len() == 1);
    }

    #[test]
    fn test_set_count_and_delete() {
        let conn = test_db();
        upsert(&conn, "h1", "a", 1, 100).expect("insert");
        set_node_count(&conn, "h1", 3, 150).expect("count");
        assert_eq!(find(&conn, "h1").expect("find").expect("row").node_count, 3);

        assert!(delete(&conn, "h1").expect("delete"));
        assert!(!delete(&conn, "h1").expect("second delete"));
        assert!(find(&conn, "h1").expect("find").is_none());
    }
}
