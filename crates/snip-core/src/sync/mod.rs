//! Draft synchronization
//!
//! The message state machine models what the UI shows about the save
//! pipeline; the engine owns the debounce, retry, and dismissal timers
//! that drive it.

pub mod engine;
pub mod message;

pub use engine::{spawn_engine, EngineCommand, EngineConfig, EngineEvent, EngineHandle};
pub use message::{MessageContent, MessageIcon, MessageMachine, MessageState, MESSAGE_DISPLAY};
