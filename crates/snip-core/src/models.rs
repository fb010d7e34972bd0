//! Data models for snip
//!
//! Defines the core data structures: `Snippet`, the identity newtypes,
//! and the ephemeral `SaveRequest`/`SavedFields` pair exchanged with
//! the save API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque snippet identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnippetId(String);

impl SnippetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(raw[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnippetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SnippetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque user identifier, resolved by the authentication collaborator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A resolved acting identity.
///
/// Anonymous viewers have no session at all (`Option<Session>`); the
/// core never sees raw credentials, only this resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// A persisted code snippet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snippet {
    /// Unique identifier
    pub id: SnippetId,
    /// Display title, absent until the owner sets one
    pub title: Option<String>,
    /// The code body
    pub code: String,
    /// Editor settings (language, theme, font, padding, line numbers).
    /// Opaque to the core; only the settings panel interprets it.
    pub settings: Value,
    /// Owner identity
    pub owner_id: UserId,
    /// Current view count
    pub views: i64,
    /// When this snippet was created
    pub created_at: DateTime<Utc>,
    /// When this snippet was last updated
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    /// Create a new empty snippet owned by the given user
    pub fn new(owner_id: UserId) -> Self {
        Self::with_id(SnippetId::generate(), owner_id)
    }

    /// Create a snippet with a specific ID (for loading from storage)
    pub fn with_id(id: SnippetId, owner_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            code: String::new(),
            settings: Value::Object(serde_json::Map::new()),
            owner_id,
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the title
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    /// Update the code body
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.updated_at = Utc::now();
    }

    /// Replace the settings blob
    pub fn set_settings(&mut self, settings: Value) {
        self.settings = settings;
        self.updated_at = Utc::now();
    }

    /// Title for display, falling back to "Untitled"
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }
}

/// One outbound save: snippet identity plus a payload snapshot.
///
/// Created by the sync engine per attempt and discarded on completion;
/// the draft itself is never sent directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveRequest {
    pub snippet_id: SnippetId,
    pub title: Option<String>,
    pub code: String,
    pub settings: Value,
    /// When the engine issued this request
    pub issued_at: DateTime<Utc>,
}

impl SaveRequest {
    pub fn new(
        snippet_id: SnippetId,
        title: Option<String>,
        code: String,
        settings: Value,
    ) -> Self {
        Self {
            snippet_id,
            title,
            code,
            settings,
            issued_at: Utc::now(),
        }
    }
}

/// The fields the API echoes back on a successful save
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedFields {
    pub id: SnippetId,
    pub title: Option<String>,
    pub code: String,
    pub settings: Value,
}
