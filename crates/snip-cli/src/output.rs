//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use snip_core::Snippet;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a snippet with its metadata and code body
    pub fn print_snippet(&self, snippet: &Snippet) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", snippet.id);
                println!("Title:    {}", snippet.display_title());
                println!("Owner:    {}", snippet.owner_id);
                println!("Views:    {}", snippet.views);
                println!("Created:  {}", snippet.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:  {}", snippet.updated_at.format("%Y-%m-%d %H:%M"));
                if !snippet.code.is_empty() {
                    println!();
                    println!("{}", snippet.code);
                }
            }
            OutputFormat::Json => match serde_json::to_string_pretty(snippet) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize snippet: {}", e),
            },
            OutputFormat::Quiet => {
                println!("{}", snippet.id);
            }
        }
    }

    /// Print a list of snippets, one summary line each
    pub fn print_snippets(&self, snippets: &[Snippet]) {
        match self.format {
            OutputFormat::Human => {
                if snippets.is_empty() {
                    println!("No snippets found.");
                    return;
                }
                for snippet in snippets {
                    println!(
                        "{} | {} | {} view(s)",
                        snippet.id,
                        truncate(snippet.display_title(), 35),
                        snippet.views
                    );
                }
                println!("\n{} snippet(s)", snippets.len());
            }
            OutputFormat::Json => match serde_json::to_string_pretty(snippets) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize snippets: {}", e),
            },
            OutputFormat::Quiet => {
                for snippet in snippets {
                    println!("{}", snippet.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max length in characters, adding "..." if
/// truncated. Counts chars, not bytes: titles are user content and may
/// be multibyte.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
