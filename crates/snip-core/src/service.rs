//! Snippet service
//!
//! The server-side boundary over the record store. Every mutation
//! re-checks the authorization gate here regardless of what the client
//! claimed; the client-side check only gates UI affordances.
//!
//! Errors come back in the same `ApiError` taxonomy the HTTP layer
//! produces, so CLI-local and remote operation look identical to
//! callers.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::auth;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{SaveRequest, SavedFields, Session, Snippet, SnippetId, UserId};
use crate::storage::SnippetRecords;
use crate::views::ViewCounter;

/// Maximum snippets a single user may own
pub const MAX_SNIPPETS_PER_USER: i64 = 10;

/// Maximum title length accepted by a save
pub const MAX_TITLE_LEN: usize = 191;

/// Maximum code body size accepted by a save, in bytes
pub const MAX_CODE_BYTES: usize = 100_000;

/// Service facade over the snippet record store
pub struct SnippetService {
    records: SnippetRecords,
}

impl SnippetService {
    /// Open the service against the configured record store
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(&config)
    }

    /// Open the service with a specific configuration
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let records = SnippetRecords::open(&config.sqlite_path())
            .context("Failed to open snippet record store")?;
        Ok(Self { records })
    }

    /// Wrap an already-open record store (for tests)
    pub fn with_records(records: SnippetRecords) -> Self {
        Self { records }
    }

    /// Create a new snippet owned by the session user.
    ///
    /// Anonymous callers are rejected; owners at the quota get
    /// `QuotaExceeded` ("Limit reached" in the UI).
    pub fn create(
        &self,
        session: Option<&Session>,
        title: Option<String>,
        code: String,
    ) -> ApiResult<Snippet> {
        let session = session
            .ok_or_else(|| ApiError::Auth("You must be signed in to create snippets".into()))?;

        let owned = self.records.count_for_owner(&session.user_id)?;
        if owned >= MAX_SNIPPETS_PER_USER {
            warn!(user = %session.user_id, owned, "snippet quota reached");
            return Err(ApiError::QuotaExceeded(
                "You have reached the maximum number of snippets".into(),
            ));
        }

        validate_payload(title.as_deref(), &code)?;

        let mut snippet = Snippet::new(session.user_id.clone());
        snippet.set_title(title);
        snippet.set_code(code);
        self.records.insert(&snippet)?;

        info!(snippet = %snippet.id, user = %session.user_id, "snippet created");
        Ok(snippet)
    }

    /// All snippets owned by the session user
    pub fn list(&self, session: Option<&Session>) -> ApiResult<Vec<Snippet>> {
        let session = session
            .ok_or_else(|| ApiError::Auth("You must be signed in to list snippets".into()))?;
        Ok(self.records.list_for_owner(&session.user_id)?)
    }

    /// Read-only fetch of a snippet, including its current view count
    pub fn read(&self, id: &SnippetId) -> ApiResult<Snippet> {
        self.records
            .get(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Snippet '{}' does not exist", id)))
    }

    /// Persist a save request.
    ///
    /// The authorization gate runs here, server-side, before anything
    /// is committed; a client that bypassed its own check still fails.
    pub fn save(&self, session: Option<&Session>, request: &SaveRequest) -> ApiResult<SavedFields> {
        let snippet = self.read(&request.snippet_id)?;

        if !auth::can_edit(session, &snippet.owner_id) {
            warn!(snippet = %request.snippet_id, "save rejected by authorization gate");
            return Err(ApiError::Auth(
                "You do not have permission to edit this snippet".into(),
            ));
        }

        validate_payload(request.title.as_deref(), &request.code)?;

        self.records.apply_save(request)?;
        info!(snippet = %request.snippet_id, "snippet saved");

        Ok(SavedFields {
            id: request.snippet_id.clone(),
            title: request.title.clone(),
            code: request.code.clone(),
            settings: request.settings.clone(),
        })
    }

    /// Record a page load, returning the (possibly unchanged) count
    pub fn view(&self, id: &SnippetId, viewer: Option<&UserId>) -> ApiResult<i64> {
        Ok(ViewCounter::new(&self.records).increment(id, viewer)?)
    }

    /// Title for page metadata; "404" when the snippet is missing.
    ///
    /// Metadata generation consumes only the title field.
    pub fn metadata_title(&self, id: &SnippetId) -> String {
        match self.records.get(id) {
            Ok(Some(snippet)) => snippet.display_title().to_string(),
            _ => "404".to_string(),
        }
    }
}

fn validate_payload(title: Option<&str>, code: &str) -> ApiResult<()> {
    if let Some(title) = title {
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ApiError::Validation("Title is too long".into()));
        }
    }
    if code.len() > MAX_CODE_BYTES {
        return Err(ApiError::Validation("Snippet is too long".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SnippetRecords;

    fn test_service() -> SnippetService {
        SnippetService::with_records(SnippetRecords::open_in_memory().unwrap())
    }

    fn session(user: &str) -> Session {
        Session::new(UserId::new(user))
    }

    #[test]
    fn test_create_and_read() {
        let service = test_service();
        let created = service
            .create(
                Some(&session("user1")),
                Some("Hello".to_string()),
                "fn main() {}".to_string(),
            )
            .unwrap();

        let loaded = service.read(&created.id).unwrap();
        assert_eq!(loaded.title, Some("Hello".to_string()));
        assert_eq!(loaded.owner_id, UserId::new("user1"));
        assert_eq!(loaded.views, 0);
    }

    #[test]
    fn test_create_requires_session() {
        let service = test_service();
        let err = service.create(None, None, "code".to_string()).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn test_create_enforces_quota() {
        let service = test_service();
        let session = session("user1");

        for _ in 0..MAX_SNIPPETS_PER_USER {
            service
                .create(Some(&session), None, "code".to_string())
                .unwrap();
        }

        let err = service
            .create(Some(&session), None, "one more".to_string())
            .unwrap_err();
        assert!(matches!(err, ApiError::QuotaExceeded(_)));

        // A different user is unaffected
        let other = super::Session::new(UserId::new("user2"));
        assert!(service.create(Some(&other), None, "ok".to_string()).is_ok());
    }

    #[test]
    fn test_list_returns_only_owned_snippets() {
        let service = test_service();
        let owner = session("user1");
        service
            .create(Some(&owner), Some("Mine".to_string()), "a".to_string())
            .unwrap();
        service
            .create(Some(&session("user2")), None, "b".to_string())
            .unwrap();

        let listed = service.list(Some(&owner)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, Some("Mine".to_string()));

        let err = service.list(None).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn test_read_missing() {
        let service = test_service();
        let err = service.read(&SnippetId::new("missing")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_save_by_owner() {
        let service = test_service();
        let owner = session("user1");
        let created = service
            .create(Some(&owner), None, "v1".to_string())
            .unwrap();

        let request = SaveRequest::new(
            created.id.clone(),
            Some("Titled".to_string()),
            "v2".to_string(),
            serde_json::json!({ "language": "rust" }),
        );
        let saved = service.save(Some(&owner), &request).unwrap();
        assert_eq!(saved.code, "v2");

        let loaded = service.read(&created.id).unwrap();
        assert_eq!(loaded.code, "v2");
        assert_eq!(loaded.title, Some("Titled".to_string()));
    }

    #[test]
    fn test_save_rejected_for_non_owner() {
        let service = test_service();
        let owner = session("user1");
        let created = service
            .create(Some(&owner), None, "v1".to_string())
            .unwrap();

        let request = SaveRequest::new(
            created.id.clone(),
            None,
            "hijacked".to_string(),
            serde_json::json!({}),
        );

        // A forged client-side check changes nothing: the gate runs here
        let intruder = session("user2");
        let err = service.save(Some(&intruder), &request).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));

        let err = service.save(None, &request).unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));

        // Content is untouched
        assert_eq!(service.read(&created.id).unwrap().code, "v1");
    }

    #[test]
    fn test_save_missing_snippet() {
        let service = test_service();
        let request = SaveRequest::new(
            SnippetId::new("missing"),
            None,
            "code".to_string(),
            serde_json::json!({}),
        );
        let err = service.save(Some(&session("user1")), &request).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_save_validates_payload() {
        let service = test_service();
        let owner = session("user1");
        let created = service
            .create(Some(&owner), None, "v1".to_string())
            .unwrap();

        let request = SaveRequest::new(
            created.id.clone(),
            Some("t".repeat(MAX_TITLE_LEN + 1)),
            "code".to_string(),
            serde_json::json!({}),
        );
        let err = service.save(Some(&owner), &request).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let request = SaveRequest::new(
            created.id.clone(),
            None,
            "x".repeat(MAX_CODE_BYTES + 1),
            serde_json::json!({}),
        );
        let err = service.save(Some(&owner), &request).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_view_counting() {
        let service = test_service();
        let owner = session("user1");
        let created = service
            .create(Some(&owner), None, "code".to_string())
            .unwrap();

        assert_eq!(service.view(&created.id, None).unwrap(), 1);
        assert_eq!(
            service
                .view(&created.id, Some(&UserId::new("user2")))
                .unwrap(),
            2
        );
        // Owner loads never change the count
        assert_eq!(
            service.view(&created.id, Some(&owner.user_id)).unwrap(),
            2
        );
    }

    #[test]
    fn test_metadata_title() {
        let service = test_service();
        let owner = session("user1");

        let untitled = service
            .create(Some(&owner), None, "code".to_string())
            .unwrap();
        assert_eq!(service.metadata_title(&untitled.id), "Untitled");

        let titled = service
            .create(Some(&owner), Some("My gist".to_string()), "code".to_string())
            .unwrap();
        assert_eq!(service.metadata_title(&titled.id), "My gist");

        assert_eq!(service.metadata_title(&SnippetId::new("missing")), "404");
    }
}
