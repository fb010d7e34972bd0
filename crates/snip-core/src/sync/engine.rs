//! Save coordinator
//!
//! Sits between the draft store and the save transport. Edits arm a
//! trailing-edge debounce timer; when it fires the engine snapshots the
//! draft and sends one save request, holding at most one in flight.
//! Edits landing during a flight coalesce into a single trailing save
//! issued when the current one resolves.
//!
//! Network failures retry with doubling backoff up to a bounded number
//! of attempts. Every other error is taken at its word and surfaces
//! immediately; an authorization failure additionally drops the editor
//! into read-only mode for the rest of the session.
//!
//! The engine owns the message timers: terminal feedback states are
//! dismissed after the display window, and a save re-entering `Pending`
//! cancels the outstanding dismissal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::auth;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::fetch::SaveTransport;
use crate::models::{SaveRequest, SavedFields, Session};
use crate::store::{StateStore, StoreEvent, StoreUpdate};
use crate::sync::message::{MessageMachine, MessageState, MESSAGE_DISPLAY};

/// Timing knobs for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period after the last edit before a save is issued
    pub debounce: Duration,
    /// How long terminal messages stay visible
    pub message_display: Duration,
    /// Total attempts per save request (network failures only)
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per attempt
    pub initial_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            message_display: MESSAGE_DISPLAY,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            message_display: config.message_display(),
            max_attempts: config.save_max_attempts,
            initial_backoff: config.save_backoff(),
        }
    }
}

/// Commands accepted by a running engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Stop syncing, cancel timers, reset the message to idle
    Teardown,
}

/// Engine lifecycle notifications, mainly for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    SaveStarted { revision: u64 },
    SaveSucceeded { revision: u64 },
    SaveFailed { outcome: MessageState },
}

/// Handle to a spawned engine task
pub struct EngineHandle {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    message_rx: watch::Receiver<MessageState>,
    event_rx: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Latest message state published by the engine
    pub fn message(&self) -> MessageState {
        *self.message_rx.borrow()
    }

    /// Watch message state changes
    pub fn subscribe_message(&self) -> watch::Receiver<MessageState> {
        self.message_rx.clone()
    }

    /// Take the event stream; can only be taken once
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<EngineEvent>> {
        self.event_rx.take()
    }

    /// Stop the engine and wait for it to wind down
    pub async fn teardown(self) {
        let _ = self.command_tx.send(EngineCommand::Teardown);
        let _ = self.task.await;
    }
}

/// Spawn the save coordinator for an open snippet.
///
/// The engine subscribes to the store, so any draft mutation made
/// through [`StateStore::update`] schedules a save automatically.
pub fn spawn_engine<T: SaveTransport>(
    store: StateStore,
    session: Option<Session>,
    transport: Arc<T>,
    config: EngineConfig,
) -> EngineHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (edit_tx, edit_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = watch::channel(store.message());

    store.subscribe(move |event| {
        if let StoreEvent::DraftChanged { revision } = event {
            let _ = edit_tx.send(*revision);
        }
    });

    let engine = Engine {
        store,
        session,
        transport,
        config,
        machine: MessageMachine::new(),
        command_rx,
        edit_rx,
        done_rx,
        done_tx,
        event_tx,
        message_tx,
        debounce_deadline: None,
        dismiss_deadline: None,
        in_flight: None,
        trailing: false,
    };

    let task = tokio::spawn(engine.run());

    EngineHandle {
        command_tx,
        message_rx,
        event_rx: Some(event_rx),
        task,
    }
}

struct Engine<T: SaveTransport> {
    store: StateStore,
    session: Option<Session>,
    transport: Arc<T>,
    config: EngineConfig,
    machine: MessageMachine,
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    edit_rx: mpsc::UnboundedReceiver<u64>,
    done_rx: mpsc::UnboundedReceiver<(u64, ApiResult<SavedFields>)>,
    done_tx: mpsc::UnboundedSender<(u64, ApiResult<SavedFields>)>,
    event_tx: mpsc::UnboundedSender<EngineEvent>,
    message_tx: watch::Sender<MessageState>,
    debounce_deadline: Option<Instant>,
    dismiss_deadline: Option<Instant>,
    in_flight: Option<(u64, JoinHandle<()>)>,
    trailing: bool,
}

impl<T: SaveTransport> Engine<T> {
    async fn run(mut self) {
        debug!("save coordinator started");
        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => match command {
                    EngineCommand::Teardown => {
                        self.teardown();
                        break;
                    }
                },
                Some(revision) = self.edit_rx.recv() => self.on_edit(revision),
                Some((revision, result)) = self.done_rx.recv() => {
                    self.on_complete(revision, result);
                }
                _ = sleep_until_or_pending(self.debounce_deadline) => self.on_debounce(),
                _ = sleep_until_or_pending(self.dismiss_deadline) => self.on_dismiss(),
            }
        }
        debug!("save coordinator stopped");
    }

    /// An edit landed; restart the quiet-period timer
    fn on_edit(&mut self, revision: u64) {
        if self.store.is_read_only() {
            return;
        }
        debug!(revision, "edit observed, debounce armed");
        self.debounce_deadline = Some(Instant::now() + self.config.debounce);
    }

    /// The quiet period elapsed with no further edits
    fn on_debounce(&mut self) {
        self.debounce_deadline = None;

        let draft = self.store.get();
        if !draft.is_dirty() {
            return;
        }

        if self.in_flight.is_some() {
            // Coalesce into one trailing save once the flight resolves
            self.trailing = true;
            return;
        }

        if !auth::can_edit(self.session.as_ref(), &draft.owner_id) {
            // No request leaves the engine; the save fails locally and
            // the editor locks for the rest of the session.
            warn!(snippet = %draft.snippet_id, "save blocked: not the owner");
            let pending = self.machine.begin_save();
            self.publish(pending);
            let outcome = self.machine.resolve(MessageState::Error);
            self.publish(outcome);
            let _ = self.event_tx.send(EngineEvent::SaveFailed { outcome });
            self.store.update(StoreUpdate::ReadOnly(true));
            self.dismiss_deadline = Some(Instant::now() + self.config.message_display);
            return;
        }

        self.start_save();
    }

    /// Snapshot the draft and put one save request in flight
    fn start_save(&mut self) {
        let draft = self.store.get();
        let revision = draft.revision();
        let request = SaveRequest::new(
            draft.snippet_id.clone(),
            draft.title.clone(),
            draft.code.clone(),
            draft.settings.clone(),
        );

        let pending = self.machine.begin_save();
        self.publish(pending);
        // A new pending save cancels any scheduled dismissal
        self.dismiss_deadline = None;

        debug!(revision, snippet = %request.snippet_id, "save issued");
        let _ = self.event_tx.send(EngineEvent::SaveStarted { revision });

        let transport = Arc::clone(&self.transport);
        let done_tx = self.done_tx.clone();
        let max_attempts = self.config.max_attempts;
        let initial_backoff = self.config.initial_backoff;
        let task = tokio::spawn(async move {
            let result = save_with_retry(transport, request, max_attempts, initial_backoff).await;
            let _ = done_tx.send((revision, result));
        });
        self.in_flight = Some((revision, task));
    }

    /// The in-flight save resolved
    fn on_complete(&mut self, revision: u64, result: ApiResult<SavedFields>) {
        self.in_flight = None;

        let outcome = match result {
            Ok(_) => {
                self.store.mark_saved(revision);
                let _ = self.event_tx.send(EngineEvent::SaveSucceeded { revision });
                MessageState::Success
            }
            Err(error) => {
                warn!(revision, %error, "save failed");
                if matches!(error, ApiError::Auth(_)) {
                    // The session can no longer edit this snippet
                    self.store.update(StoreUpdate::ReadOnly(true));
                }
                let outcome = classify(&error);
                let _ = self.event_tx.send(EngineEvent::SaveFailed { outcome });
                outcome
            }
        };

        let resolved = self.machine.resolve(outcome);
        self.publish(resolved);
        self.dismiss_deadline = Some(Instant::now() + self.config.message_display);

        if self.trailing {
            self.trailing = false;
            if self.store.get().is_dirty() && !self.store.is_read_only() {
                self.start_save();
            }
        }
    }

    /// The display window for a terminal message elapsed
    fn on_dismiss(&mut self) {
        self.dismiss_deadline = None;
        if self.machine.dismiss() {
            self.publish(MessageState::Idle);
        }
    }

    /// Navigation away: cancel everything, reset the message
    fn teardown(&mut self) {
        if let Some((_, task)) = self.in_flight.take() {
            task.abort();
        }
        self.debounce_deadline = None;
        self.dismiss_deadline = None;
        self.machine.force_idle();
        self.publish(MessageState::Idle);
    }

    /// Mirror a message transition into the store and the watch channel
    fn publish(&mut self, state: MessageState) {
        self.store.update(StoreUpdate::Message(state));
        let _ = self.message_tx.send(state);
    }
}

/// Run one save request, retrying transient failures with doubling
/// backoff. Non-transient errors return immediately.
async fn save_with_retry<T: SaveTransport>(
    transport: Arc<T>,
    request: SaveRequest,
    max_attempts: u32,
    initial_backoff: Duration,
) -> ApiResult<SavedFields> {
    let mut backoff = initial_backoff;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match transport.save(request.clone()).await {
            Ok(saved) => return Ok(saved),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                warn!(attempt, backoff_ms = backoff.as_millis() as u64, %error, "save retry");
                time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Map a save error onto the message state shown for it
fn classify(error: &ApiError) -> MessageState {
    match error {
        ApiError::RateLimit(_) => MessageState::TooManyRequests,
        ApiError::QuotaExceeded(_) => MessageState::LimitReached,
        _ => MessageState::Error,
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snippet, SnippetId, UserId};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted transport: pops one outcome per call, records each
    /// request with the (paused) time it arrived.
    struct FakeTransport {
        script: Mutex<VecDeque<ApiResult<()>>>,
        requests: Mutex<Vec<(SaveRequest, Instant)>>,
        delay: Option<Duration>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeTransport {
        fn new(script: Vec<ApiResult<()>>) -> Arc<Self> {
            Self::build(script, None)
        }

        fn with_delay(script: Vec<ApiResult<()>>, delay: Duration) -> Arc<Self> {
            Self::build(script, Some(delay))
        }

        fn build(script: Vec<ApiResult<()>>, delay: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
                delay,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn request(&self, index: usize) -> (SaveRequest, Instant) {
            self.requests.lock()[index].clone()
        }
    }

    impl SaveTransport for FakeTransport {
        async fn save(&self, request: SaveRequest) -> ApiResult<SavedFields> {
            self.requests.lock().push((request.clone(), Instant::now()));
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                time::sleep(delay).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            let outcome = self.script.lock().pop_front();
            match outcome {
                None | Some(Ok(())) => Ok(SavedFields {
                    id: request.snippet_id,
                    title: request.title,
                    code: request.code,
                    settings: request.settings,
                }),
                Some(Err(error)) => Err(error),
            }
        }
    }

    fn owner_session() -> Option<Session> {
        Some(Session::new(UserId::new("user1")))
    }

    fn setup(
        session: Option<Session>,
        transport: Arc<FakeTransport>,
    ) -> (StateStore, EngineHandle) {
        let snippet = Snippet::with_id(SnippetId::new("abc123"), UserId::new("user1"));
        let store = StateStore::new(&snippet);
        let handle = spawn_engine(
            store.clone(),
            session,
            transport,
            EngineConfig::default(),
        );
        (store, handle)
    }

    fn edit(store: &StateStore, code: &str) {
        store.update(StoreUpdate::Code(code.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_save() {
        let transport = FakeTransport::new(vec![]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_millis(100)).await;
        edit(&store, "b");
        time::sleep(Duration::from_millis(100)).await;
        edit(&store, "c");

        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.request(0).0.code, "c");
        assert!(!store.get().is_dirty());

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_edit_restarts_the_quiet_period() {
        let transport = FakeTransport::new(vec![]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        // Edits every 500ms keep resetting the 750ms window
        for code in ["a", "b", "c", "d"] {
            edit(&store, code);
            time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(transport.request_count(), 0);

        // 500 + 750 past the last edit, the save goes out
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.request(0).0.code, "d");

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_flight_triggers_one_trailing_save() {
        let transport = FakeTransport::with_delay(vec![], Duration::from_secs(1));
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        // Save for "a" goes out at 750ms and stays in flight for 1s
        time::sleep(Duration::from_millis(800)).await;
        assert_eq!(transport.request_count(), 1);

        // Two edits land while the save is in flight
        edit(&store, "b");
        time::sleep(Duration::from_millis(100)).await;
        edit(&store, "c");

        time::sleep(Duration::from_secs(3)).await;

        // Exactly one trailing save, carrying the latest content
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.request(1).0.code, "c");
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);
        assert!(!store.get().is_dirty());

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_message_dismisses_after_display_window() {
        let transport = FakeTransport::new(vec![]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_millis(800)).await;
        assert_eq!(handle.message(), MessageState::Success);
        assert_eq!(store.message(), MessageState::Success);

        // Still visible just before the window closes
        time::sleep(Duration::from_millis(2400)).await;
        assert_eq!(handle.message(), MessageState::Success);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.message(), MessageState::Idle);
        assert_eq!(store.message(), MessageState::Idle);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_never_times_out() {
        let transport = FakeTransport::with_delay(vec![], Duration::from_secs(10));
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_millis(800)).await;
        assert_eq!(handle.message(), MessageState::Pending);

        // Far past the display window, the save is still in flight
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.message(), MessageState::Pending);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.message(), MessageState::Success);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_not_retried() {
        let transport =
            FakeTransport::new(vec![Err(ApiError::RateLimit("slow down".to_string()))]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        // The distinct feedback state is shown once the save resolves
        time::sleep(Duration::from_millis(800)).await;
        assert_eq!(handle.message(), MessageState::TooManyRequests);
        assert_eq!(store.message(), MessageState::TooManyRequests);

        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(handle.message(), MessageState::Idle);
        assert!(store.get().is_dirty());

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_error_shows_limit_reached() {
        let transport =
            FakeTransport::new(vec![Err(ApiError::QuotaExceeded("limit".to_string()))]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_millis(800)).await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(handle.message(), MessageState::LimitReached);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_retry_with_doubling_backoff() {
        let transport = FakeTransport::new(vec![
            Err(ApiError::Network("connection reset".to_string())),
            Err(ApiError::Network("connection reset".to_string())),
            Ok(()),
        ]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.request_count(), 3);
        let (_, first) = transport.request(0);
        let (_, second) = transport.request(1);
        let (_, third) = transport.request(2);
        assert_eq!(second - first, Duration::from_secs(1));
        assert_eq!(third - second, Duration::from_secs(2));

        assert!(!store.get().is_dirty());

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_exhausts_attempts_then_errors() {
        let transport = FakeTransport::new(vec![
            Err(ApiError::Network("down".to_string())),
            Err(ApiError::Network("down".to_string())),
            Err(ApiError::Network("down".to_string())),
        ]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        // Attempts land at 750ms, +1s, +2s; check the message right after
        time::sleep(Duration::from_millis(4000)).await;

        assert_eq!(transport.request_count(), 3);
        assert_eq!(handle.message(), MessageState::Error);
        assert!(store.get().is_dirty());

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_owner_session_never_reaches_the_wire() {
        let transport = FakeTransport::new(vec![]);
        let intruder = Some(Session::new(UserId::new("user2")));
        let (store, mut handle) = setup(intruder, Arc::clone(&transport));
        let mut events = handle.take_events().unwrap();

        edit(&store, "a");
        time::sleep(Duration::from_millis(800)).await;

        assert_eq!(transport.request_count(), 0);
        assert_eq!(handle.message(), MessageState::Error);
        assert!(store.is_read_only());

        // The locally aborted save still reports a failure, and only that
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::SaveFailed {
                outcome: MessageState::Error
            }
        );
        assert!(events.try_recv().is_err());

        // Further edits are ignored outright
        edit(&store, "b");
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.request_count(), 0);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_auth_failure_locks_the_editor() {
        let transport = FakeTransport::new(vec![Err(ApiError::Auth("expired".to_string()))]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        time::sleep(Duration::from_millis(800)).await;

        assert_eq!(transport.request_count(), 1);
        assert_eq!(handle.message(), MessageState::Error);
        assert!(store.is_read_only());

        edit(&store, "b");
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.request_count(), 1);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_draft_issues_no_saves() {
        let transport = FakeTransport::new(vec![]);
        let (_store, handle) = setup(owner_session(), Arc::clone(&transport));

        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.request_count(), 0);
        assert_eq!(handle.message(), MessageState::Idle);

        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_a_pending_save() {
        let transport = FakeTransport::new(vec![]);
        let (store, handle) = setup(owner_session(), Arc::clone(&transport));

        edit(&store, "a");
        // Teardown before the quiet period elapses
        time::sleep(Duration::from_millis(300)).await;
        handle.teardown().await;

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.request_count(), 0);
        assert_eq!(store.message(), MessageState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_report_the_save_lifecycle() {
        let transport = FakeTransport::new(vec![Err(ApiError::Network("blip".to_string()))]);
        let (store, mut handle) = setup(owner_session(), Arc::clone(&transport));
        let mut events = handle.take_events().unwrap();

        edit(&store, "a");
        time::sleep(Duration::from_secs(10)).await;

        let revision = store.get().revision();
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::SaveStarted { revision }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::SaveSucceeded { revision }
        );

        handle.teardown().await;
    }
}
