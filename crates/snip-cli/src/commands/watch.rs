//! Watch command: live file-to-snippet sync
//!
//! Mirrors a local file into a remote snippet through the save
//! coordinator. File changes become draft edits; the coordinator
//! handles debouncing, retries, and feedback messages.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use snip_core::sync::{spawn_engine, EngineConfig};
use snip_core::{ApiClient, Config, Session, SnippetId, StateStore, StoreEvent, StoreUpdate};

use crate::output::Output;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn watch(
    config: &Config,
    session: Option<Session>,
    id: String,
    file: PathBuf,
    output: &Output,
) -> Result<()> {
    let api_url = config.api_url.as_deref().context(
        "No API URL configured. Set one with: snip config set api_url <url>",
    )?;
    let id = SnippetId::new(id);

    let client = Arc::new(ApiClient::new(api_url));
    let snippet = client
        .fetch_snippet(&id)
        .await
        .with_context(|| format!("Failed to fetch snippet {}", id))?;

    if !file.exists() {
        std::fs::write(&file, &snippet.code)
            .with_context(|| format!("Failed to write file: {}", file.display()))?;
        output.message(&format!(
            "Wrote current snippet content to {}",
            file.display()
        ));
    }

    let store = StateStore::new(&snippet);
    store.subscribe(|event| {
        if let StoreEvent::ReadOnlyChanged(true) = event {
            eprintln!("Editing disabled: you do not have permission to edit this snippet.");
        }
    });

    let handle = spawn_engine(
        store.clone(),
        session,
        Arc::clone(&client),
        EngineConfig::from_config(config),
    );
    let mut message_rx = handle.subscribe_message();

    // Local content that differs from the server copy counts as an edit
    let mut last = std::fs::read_to_string(&file).unwrap_or_default();
    if last != snippet.code {
        store.update(StoreUpdate::Code(last.clone()));
    }

    output.message(&format!(
        "Watching {} -> snippet {} (ctrl-c to stop)",
        file.display(),
        id
    ));

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                match std::fs::read_to_string(&file) {
                    Ok(content) if content != last => {
                        last = content.clone();
                        store.update(StoreUpdate::Code(content));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("failed to read {}: {}", file.display(), e),
                }
            }
            changed = message_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *message_rx.borrow_and_update();
                if let Some(content) = state.content() {
                    output.message(content.text);
                }
            }
        }
    }

    handle.teardown().await;
    output.message("Stopped watching.");
    Ok(())
}
