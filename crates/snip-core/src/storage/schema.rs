//! SQLite schema for the snippet record store
//!
//! Two tables: the snippet records themselves and a separate view-count
//! row per snippet. Keeping counts in their own table means the hot
//! increment path never rewrites snippet content rows.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Snippet records
        CREATE TABLE IF NOT EXISTS snippets (
            id TEXT PRIMARY KEY,
            title TEXT,
            code TEXT NOT NULL,
            settings TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- View counts, one row per snippet, mutated only by atomic increment
        CREATE TABLE IF NOT EXISTS views (
            snippet_id TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (snippet_id) REFERENCES snippets(id) ON DELETE CASCADE
        );

        -- Query snippets by owner (quota checks, listings)
        CREATE INDEX IF NOT EXISTS idx_snippets_owner_id ON snippets(owner_id);

        -- Query by update date (for sorting)
        CREATE INDEX IF NOT EXISTS idx_snippets_updated_at ON snippets(updated_at);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}
