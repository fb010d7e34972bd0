//! Snippet command handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use snip_core::{SaveRequest, Session, SnippetId, SnippetService, UserId};

use crate::output::Output;

/// Create a new snippet, optionally seeded from a file
pub fn create(
    service: &SnippetService,
    session: Option<&Session>,
    title: Option<String>,
    file: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let code = match file {
        Some(path) => read_code(&path)?,
        None => String::new(),
    };

    let snippet = service.create(session, title, code)?;
    output.print_snippet(&snippet);
    Ok(())
}

/// Show a snippet. Counts as a page load: the view counter runs with
/// the session user as the viewer, so owners see their own snippets
/// without inflating the count.
pub fn show(
    service: &SnippetService,
    session: Option<&Session>,
    id: String,
    output: &Output,
) -> Result<()> {
    let id = SnippetId::new(id);
    let viewer = session.map(|s| s.user_id.clone());
    service.view(&id, viewer.as_ref())?;

    let snippet = service.read(&id)?;
    output.print_snippet(&snippet);
    Ok(())
}

/// List the session user's snippets
pub fn list(service: &SnippetService, session: Option<&Session>, output: &Output) -> Result<()> {
    let snippets = service.list(session)?;
    output.print_snippets(&snippets);
    Ok(())
}

/// One-shot save of a file's content into a snippet
pub fn save(
    service: &SnippetService,
    session: Option<&Session>,
    id: String,
    title: Option<String>,
    file: PathBuf,
    output: &Output,
) -> Result<()> {
    let id = SnippetId::new(id);
    let code = read_code(&file)?;

    // Preserve fields the save does not touch
    let current = service.read(&id)?;
    let request = SaveRequest::new(
        id,
        title.or(current.title),
        code,
        current.settings,
    );

    let saved = service.save(session, &request)?;
    output.success(&format!("Saved snippet {}", saved.id));
    Ok(())
}

/// Resolve the acting identity from the --user flag or the config
pub fn resolve_session(cli_user: Option<String>, config_user: Option<&str>) -> Option<Session> {
    cli_user
        .or_else(|| config_user.map(String::from))
        .map(|user| Session::new(UserId::new(user)))
}

fn read_code(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_session_prefers_cli_flag() {
        let session = resolve_session(Some("cli-user".to_string()), Some("config-user"));
        assert_eq!(session.unwrap().user_id, UserId::new("cli-user"));

        let session = resolve_session(None, Some("config-user"));
        assert_eq!(session.unwrap().user_id, UserId::new("config-user"));

        assert!(resolve_session(None, None).is_none());
    }

    #[test]
    fn test_read_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "fn main() {}").unwrap();

        assert_eq!(read_code(&path).unwrap(), "fn main() {}");
        assert!(read_code(&dir.path().join("missing.rs")).is_err());
    }
}
