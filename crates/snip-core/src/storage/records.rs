//! Snippet record store
//!
//! SQLite-backed persistence for snippets and their view counts. The
//! view count is only ever mutated through [`SnippetRecords::increment_views`],
//! a single SQL statement, so concurrent readers can never lose
//! updates to a read-modify-write race.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema;
use crate::models::{SaveRequest, Snippet, SnippetId, UserId};

/// Handle to the snippet record store
pub struct SnippetRecords {
    conn: Connection,
}

impl SnippetRecords {
    /// Open (or create) the record store at the given path.
    ///
    /// WAL mode plus a busy timeout so concurrent page loads from
    /// separate connections serialize cleanly on the increment path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::init_schema(&conn)?;

        debug!("opened record store at {}", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory record store (for tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a new snippet along with its zeroed view-count row
    pub fn insert(&self, snippet: &Snippet) -> StorageResult<()> {
        let settings = serde_json::to_string(&snippet.settings).map_err(|e| {
            StorageError::InvalidRecord {
                id: snippet.id.to_string(),
                details: format!("settings is not valid JSON: {}", e),
            }
        })?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO snippets (id, title, code, settings, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snippet.id.as_str(),
                snippet.title,
                snippet.code,
                settings,
                snippet.owner_id.as_str(),
                snippet.created_at.timestamp_millis(),
                snippet.updated_at.timestamp_millis(),
            ],
        )?;
        tx.execute(
            "INSERT INTO views (snippet_id, count) VALUES (?1, 0)",
            params![snippet.id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch a snippet with its current view count
    pub fn get(&self, id: &SnippetId) -> StorageResult<Option<Snippet>> {
        let row = self
            .conn
            .query_row(
                "SELECT s.id, s.title, s.code, s.settings, s.owner_id,
                        s.created_at, s.updated_at, COALESCE(v.count, 0)
                 FROM snippets s
                 LEFT JOIN views v ON v.snippet_id = s.id
                 WHERE s.id = ?1",
                params![id.as_str()],
                RawSnippet::from_row,
            )
            .optional()?;

        row.map(RawSnippet::into_snippet).transpose()
    }

    /// All snippets owned by a user, most recently updated first
    pub fn list_for_owner(&self, owner_id: &UserId) -> StorageResult<Vec<Snippet>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.title, s.code, s.settings, s.owner_id,
                    s.created_at, s.updated_at, COALESCE(v.count, 0)
             FROM snippets s
             LEFT JOIN views v ON v.snippet_id = s.id
             WHERE s.owner_id = ?1
             ORDER BY s.updated_at DESC",
        )?;

        let rows = stmt.query_map(params![owner_id.as_str()], RawSnippet::from_row)?;
        let mut snippets = Vec::new();
        for row in rows {
            snippets.push(row?.into_snippet()?);
        }
        Ok(snippets)
    }

    /// Apply an accepted save request to an existing snippet
    pub fn apply_save(&self, request: &SaveRequest) -> StorageResult<()> {
        let settings = serde_json::to_string(&request.settings).map_err(|e| {
            StorageError::InvalidRecord {
                id: request.snippet_id.to_string(),
                details: format!("settings is not valid JSON: {}", e),
            }
        })?;

        let changed = self.conn.execute(
            "UPDATE snippets
             SET title = ?2, code = ?3, settings = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                request.snippet_id.as_str(),
                request.title,
                request.code,
                settings,
                Utc::now().timestamp_millis(),
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RecordNotFound {
                id: request.snippet_id.to_string(),
            });
        }
        Ok(())
    }

    /// Current view count for a snippet
    pub fn view_count(&self, id: &SnippetId) -> StorageResult<i64> {
        self.conn
            .query_row(
                "SELECT count FROM views WHERE snippet_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::RecordNotFound { id: id.to_string() })
    }

    /// Atomically bump the view count and return the new value.
    ///
    /// One SQL statement, never a read-then-write, so N concurrent
    /// callers always land at exactly +N.
    pub fn increment_views(&self, id: &SnippetId) -> StorageResult<i64> {
        self.conn
            .query_row(
                "UPDATE views SET count = count + 1 WHERE snippet_id = ?1 RETURNING count",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::RecordNotFound { id: id.to_string() })
    }

    /// How many snippets a user owns (quota checks)
    pub fn count_for_owner(&self, owner_id: &UserId) -> StorageResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM snippets WHERE owner_id = ?1",
            params![owner_id.as_str()],
            |row| row.get(0),
        )?)
    }
}

/// Row as stored, before decoding timestamps and the settings blob
struct RawSnippet {
    id: String,
    title: Option<String>,
    code: String,
    settings: String,
    owner_id: String,
    created_at: i64,
    updated_at: i64,
    views: i64,
}

impl RawSnippet {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            code: row.get(2)?,
            settings: row.get(3)?,
            owner_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            views: row.get(7)?,
        })
    }

    fn into_snippet(self) -> StorageResult<Snippet> {
        let settings =
            serde_json::from_str(&self.settings).map_err(|e| StorageError::InvalidRecord {
                id: self.id.clone(),
                details: format!("settings is not valid JSON: {}", e),
            })?;
        let created_at = decode_timestamp(self.created_at, &self.id)?;
        let updated_at = decode_timestamp(self.updated_at, &self.id)?;

        Ok(Snippet {
            id: SnippetId::new(self.id),
            title: self.title,
            code: self.code,
            settings,
            owner_id: UserId::new(self.owner_id),
            views: self.views,
            created_at,
            updated_at,
        })
    }
}

fn decode_timestamp(millis: i64, id: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StorageError::InvalidRecord {
        id: id.to_string(),
        details: format!("timestamp {} out of range", millis),
    })
}
