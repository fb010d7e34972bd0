//! Error taxonomy for the save/read API boundary
//!
//! `ApiError` is the single error type every component above the
//! transport consumes. The fetch layer is the only place HTTP status
//! codes are turned into these variants; everything upstream matches
//! on the variant, never on a status code.

use thiserror::Error;

use crate::storage::StorageError;

/// HTTP status the API uses for the per-user snippet quota.
///
/// Distinct from 401/403 (auth) and 429 (rate limit) so the limit
/// outcome can never be confused with either.
pub const QUOTA_STATUS: u16 = 402;

/// Errors produced by snippet API operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request payload was rejected before being applied
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The acting identity may not perform this operation.
    ///
    /// Fatal for the session: the client's own permission check has
    /// been invalidated, so the editor drops into read-only mode.
    #[error("Not allowed: {0}")]
    Auth(String),

    /// The snippet does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is being rate limited (HTTP 429)
    #[error("Too many requests: {0}")]
    RateLimit(String),

    /// A domain quota was hit (e.g. max snippets per user)
    #[error("Limit reached: {0}")]
    QuotaExceeded(String),

    /// Transport-level failure, no response was received.
    ///
    /// The only transient variant; the sync engine retries these with
    /// bounded backoff.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success response
    #[error("Server error ({status}): {message}")]
    UnknownServer { status: u16, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status into the taxonomy
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => ApiError::Validation(message),
            401 | 403 => ApiError::Auth(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimit(message),
            QUOTA_STATUS => ApiError::QuotaExceeded(message),
            _ => ApiError::UnknownServer { status, message },
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only network-level failures are transient; every other variant
    /// is terminal for the save attempt that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::RecordNotFound { id } => {
                ApiError::NotFound(format!("Snippet '{}' does not exist", id))
            }
            other => ApiError::UnknownServer {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
