//! Save feedback state machine
//!
//! Translates save outcomes into the bounded set of UI message states.
//! The machine itself is pure; the sync engine owns the timers that
//! drive `dismiss` and cancels them when a new save re-enters
//! `Pending`.
//!
//! Allowed transitions:
//! - `Idle` -> `Pending` when a save begins
//! - `Pending` -> terminal state when the save resolves
//! - terminal state -> `Idle` after the display duration, or
//!   immediately on teardown
//!
//! `Pending` has no timeout; it persists until the outstanding save
//! resolves.

use std::time::Duration;

/// How long a terminal message stays visible before auto-dismissal
pub const MESSAGE_DISPLAY: Duration = Duration::from_millis(2500);

/// UI feedback state for the save pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageState {
    /// Nothing to show
    #[default]
    Idle,
    /// A save is in flight
    Pending,
    /// The last save was persisted
    Success,
    /// The last save failed
    Error,
    /// The server rate-limited the save
    TooManyRequests,
    /// A domain quota was hit
    LimitReached,
}

impl MessageState {
    /// Terminal states auto-dismiss after [`MESSAGE_DISPLAY`]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageState::Success
                | MessageState::Error
                | MessageState::TooManyRequests
                | MessageState::LimitReached
        )
    }

    /// Fixed display payload for this state, `None` for `Idle`
    pub fn content(&self) -> Option<MessageContent> {
        match self {
            MessageState::Idle => None,
            MessageState::Pending => Some(MessageContent {
                text: "Saving...",
                icon: Some(MessageIcon::Spinner),
            }),
            MessageState::Success => Some(MessageContent {
                text: "Changes saved",
                icon: Some(MessageIcon::Check),
            }),
            MessageState::Error => Some(MessageContent {
                text: "Failed to save",
                icon: Some(MessageIcon::Cross),
            }),
            MessageState::TooManyRequests => Some(MessageContent {
                text: "Too many requests",
                icon: None,
            }),
            MessageState::LimitReached => Some(MessageContent {
                text: "Limit reached",
                icon: None,
            }),
        }
    }
}

/// Fixed text plus optional icon shown for a message state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContent {
    pub text: &'static str,
    pub icon: Option<MessageIcon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIcon {
    Check,
    Cross,
    Spinner,
}

/// The state machine itself
#[derive(Debug, Default)]
pub struct MessageMachine {
    state: MessageState,
}

impl MessageMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    /// A save is starting; enter `Pending`.
    ///
    /// Valid from `Idle` and from any terminal state (the caller must
    /// cancel a still-running display timer).
    pub fn begin_save(&mut self) -> MessageState {
        debug_assert!(self.state != MessageState::Pending);
        self.state = MessageState::Pending;
        self.state
    }

    /// The in-flight save resolved to a terminal outcome
    pub fn resolve(&mut self, outcome: MessageState) -> MessageState {
        debug_assert!(outcome.is_terminal());
        if self.state == MessageState::Pending {
            self.state = outcome;
        }
        self.state
    }

    /// The display timer fired; terminal states fall back to `Idle`.
    ///
    /// Returns whether a transition happened. `Pending` is unaffected:
    /// it never times out.
    pub fn dismiss(&mut self) -> bool {
        if self.state.is_terminal() {
            self.state = MessageState::Idle;
            true
        } else {
            false
        }
    }

    /// Forced reset on navigation away from the editable view
    pub fn force_idle(&mut self) {
        self.state = MessageState::Idle;
    }
}
