//! View counting
//!
//! One increment per page load, skipped when the viewer owns the
//! snippet. The increment itself happens at the storage layer as a
//! single SQL statement, so concurrent non-owner viewers never lose
//! updates.

use tracing::debug;

use crate::models::{SnippetId, UserId};
use crate::storage::{SnippetRecords, StorageError, StorageResult};

/// Increments snippet view counts at page-load time
pub struct ViewCounter<'a> {
    records: &'a SnippetRecords,
}

impl<'a> ViewCounter<'a> {
    pub fn new(records: &'a SnippetRecords) -> Self {
        Self { records }
    }

    /// Record a page load and return the resulting count.
    ///
    /// Owner loads leave the count unchanged; any other viewer
    /// (including anonymous) bumps it by exactly one.
    pub fn increment(
        &self,
        snippet_id: &SnippetId,
        viewer: Option<&UserId>,
    ) -> StorageResult<i64> {
        let snippet = self
            .records
            .get(snippet_id)?
            .ok_or_else(|| StorageError::RecordNotFound {
                id: snippet_id.to_string(),
            })?;

        if viewer == Some(&snippet.owner_id) {
            debug!(snippet = %snippet_id, "owner view, count unchanged");
            return Ok(snippet.views);
        }

        let count = self.records.increment_views(snippet_id)?;
        debug!(snippet = %snippet_id, count, "view recorded");
        Ok(count)
    }
}
