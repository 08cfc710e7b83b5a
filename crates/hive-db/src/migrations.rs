//! Forward-only schema migrations.
//!
//! `STEPS[n]` upgrades a database from `user_version` n to n + 1. Each step
//! and its version bump commit together, so an interrupted upgrade resumes
//! from the last completed step.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Migration scripts in version order.
pub const STEPS: &[&str] = &[schema::SCHEMA_V1];

/// Bring the database up to [`SCHEMA_VERSION`].
pub fn run(conn: &Connection) -> Result<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database is at v{found}, this build understands up to v{SCHEMA_VERSION}"
        )));
    }

    for (index, script) in STEPS.iter().enumerate().skip(found as usize) {
        let target = index as u32 + 1;
        tracing::info!("Migrating database schema to v{target}");
        conn.execute_batch(&format!(
            "BEGIN;\n{script}\nPRAGMA user_version = {target};\nCOMMIT;"
        ))
        .map_err(|e| DbError::Migration(format!("step to v{target}: {e}")))?;
    }
    Ok(())
}
