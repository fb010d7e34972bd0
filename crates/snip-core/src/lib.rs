//! Core library for snip, a code snippet sharing service.
//!
//! The crate centers on a client-side synchronization pipeline: a
//! reactive [`store::StateStore`] holds the in-memory draft, the
//! [`sync`] engine debounces edits into single-flight save requests,
//! and the [`fetch`] transport is the one place HTTP statuses become
//! typed [`error::ApiError`]s. Around that sit the snippet service,
//! the SQLite record store with its atomic view counter, and the
//! authorization gate.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod service;
pub mod storage;
pub mod store;
pub mod sync;
pub mod views;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use fetch::{ApiClient, SaveTransport};
pub use models::{SaveRequest, SavedFields, Session, Snippet, SnippetId, UserId};
pub use service::SnippetService;
pub use store::{StateStore, StoreEvent, StoreUpdate};
pub use sync::{spawn_engine, EngineConfig, EngineHandle, MessageState};
pub use views::ViewCounter;
