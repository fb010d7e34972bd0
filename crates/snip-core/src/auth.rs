//! Authorization gate
//!
//! A single pure predicate bounds who may mutate a snippet. It is
//! consulted twice: client-side before exposing edit affordances and
//! issuing saves, and server-side in `SnippetService` before any
//! mutation is committed. Only the server-side check is the security
//! boundary; the client-side one is a UX convenience.

use crate::models::{Session, UserId};

/// True iff a session exists and its identity is the snippet owner
pub fn can_edit(session: Option<&Session>, owner_id: &UserId) -> bool {
    session.is_some_and(|s| s.user_id == *owner_id)
}
