//! Reactive draft container
//!
//! The `StateStore` holds the in-memory draft of a snippet plus the UI
//! message mirror. Mutations go through [`StateStore::update`], which
//! notifies every subscriber synchronously before returning. No timers
//! or network logic live here; the sync engine layers scheduling on
//! top of the subscription.
//!
//! Dirty tracking uses two counters: `revision` increments on every
//! draft mutation, `saved_revision` records the newest revision a
//! successful save has covered. Edits racing an in-flight save bump
//! `revision` past the snapshot being saved, so the draft stays dirty
//! and a trailing save picks the newer content up.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::models::{Snippet, SnippetId, UserId};
use crate::sync::MessageState;

/// In-memory snippet content, owned exclusively by the store
#[derive(Debug, Clone)]
pub struct Draft {
    pub snippet_id: SnippetId,
    pub owner_id: UserId,
    pub title: Option<String>,
    pub code: String,
    pub settings: Value,
    revision: u64,
    saved_revision: u64,
}

impl Draft {
    fn from_snippet(snippet: &Snippet) -> Self {
        Self {
            snippet_id: snippet.id.clone(),
            owner_id: snippet.owner_id.clone(),
            title: snippet.title.clone(),
            code: snippet.code.clone(),
            settings: snippet.settings.clone(),
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Whether the draft has mutations no successful save has covered
    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    /// Monotonically increasing mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// A single draft mutation
#[derive(Debug, Clone)]
pub enum StoreUpdate {
    Title(Option<String>),
    Code(String),
    Settings(Value),
    Message(MessageState),
    ReadOnly(bool),
}

/// What subscribers observe
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Draft content changed (title, code, or settings)
    DraftChanged { revision: u64 },
    /// The UI message mirror changed
    MessageChanged(MessageState),
    /// The editor was forced into or out of read-only mode
    ReadOnlyChanged(bool),
}

type Subscriber = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

struct Inner {
    draft: Draft,
    message: MessageState,
    read_only: bool,
    subscribers: Vec<Subscriber>,
}

/// Process-wide reactive container for one open snippet.
///
/// Cheap to clone; clones share state. Instances are dependency
/// injected so tests can create isolated stores.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

impl StateStore {
    /// Hydrate a store from a loaded snippet
    pub fn new(snippet: &Snippet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                draft: Draft::from_snippet(snippet),
                message: MessageState::Idle,
                read_only: false,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Snapshot the current draft
    pub fn get(&self) -> Draft {
        self.inner.lock().draft.clone()
    }

    /// Partial read without cloning the whole draft
    pub fn select<R>(&self, projection: impl FnOnce(&Draft) -> R) -> R {
        projection(&self.inner.lock().draft)
    }

    /// Current UI message mirror
    pub fn message(&self) -> MessageState {
        self.inner.lock().message
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.lock().read_only
    }

    /// Register a subscriber for all future mutations
    pub fn subscribe(&self, subscriber: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        self.inner.lock().subscribers.push(Arc::new(subscriber));
    }

    /// Apply a mutation and notify all subscribers before returning
    pub fn update(&self, update: StoreUpdate) {
        let (event, subscribers) = {
            let mut inner = self.inner.lock();
            let event = match update {
                StoreUpdate::Title(title) => {
                    inner.draft.title = title;
                    inner.draft.revision += 1;
                    StoreEvent::DraftChanged {
                        revision: inner.draft.revision,
                    }
                }
                StoreUpdate::Code(code) => {
                    inner.draft.code = code;
                    inner.draft.revision += 1;
                    StoreEvent::DraftChanged {
                        revision: inner.draft.revision,
                    }
                }
                StoreUpdate::Settings(settings) => {
                    inner.draft.settings = settings;
                    inner.draft.revision += 1;
                    StoreEvent::DraftChanged {
                        revision: inner.draft.revision,
                    }
                }
                StoreUpdate::Message(state) => {
                    inner.message = state;
                    StoreEvent::MessageChanged(state)
                }
                StoreUpdate::ReadOnly(read_only) => {
                    inner.read_only = read_only;
                    StoreEvent::ReadOnlyChanged(read_only)
                }
            };
            (event, inner.subscribers.clone())
        };

        // Subscribers run outside the lock so they may read the store
        for subscriber in &subscribers {
            subscriber(&event);
        }
    }

    /// Record that a successful save covered `revision`.
    ///
    /// Clears the dirty flag only if no newer edit has landed since
    /// the saved snapshot was taken.
    pub fn mark_saved(&self, revision: u64) {
        let mut inner = self.inner.lock();
        if revision > inner.draft.saved_revision {
            inner.draft.saved_revision = revision;
        }
    }
}
