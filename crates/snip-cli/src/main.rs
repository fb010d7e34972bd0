//! snip CLI
//!
//! Command-line interface for snip - code snippet sharing.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use snip_core::{Config, SnippetService};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "snip")]
#[command(about = "snip - share code snippets")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Act as this user (overrides the configured identity)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new snippet
    #[command(alias = "new")]
    Create {
        /// Snippet title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// File to read the code from (empty snippet if omitted)
        file: Option<PathBuf>,
    },
    /// Show a snippet (counts as a page load)
    Show {
        /// Snippet ID
        id: String,
    },
    /// List your snippets
    #[command(alias = "ls")]
    List,
    /// Save a file's content into a snippet
    Save {
        /// Snippet ID
        id: String,
        /// File to read the code from
        file: PathBuf,
        /// New snippet title (kept unchanged if omitted)
        #[arg(short = 'T', long)]
        title: Option<String>,
    },
    /// Watch a file and continuously sync it into a remote snippet
    Watch {
        /// Snippet ID
        id: String,
        /// File to watch
        file: PathBuf,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_url, user, debounce_ms)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        // Config commands don't need the record store
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, &output)
            }
        },
        // Watch talks to the remote API, not the local store
        Commands::Watch { id, file } => {
            let config = Config::load()?;
            let session = commands::snippet::resolve_session(cli.user, config.user.as_deref());
            commands::watch::watch(&config, session, id, file, &output).await
        }
        command => {
            let config = Config::load()?;
            let session = commands::snippet::resolve_session(cli.user, config.user.as_deref());
            let service = SnippetService::open_with_config(&config)?;

            match command {
                Commands::Create { title, file } => {
                    commands::snippet::create(&service, session.as_ref(), title, file, &output)
                }
                Commands::Show { id } => {
                    commands::snippet::show(&service, session.as_ref(), id, &output)
                }
                Commands::List => commands::snippet::list(&service, session.as_ref(), &output),
                Commands::Save { id, file, title } => {
                    commands::snippet::save(&service, session.as_ref(), id, title, file, &output)
                }
                Commands::Watch { .. } | Commands::Config { .. } => unreachable!(), // Handled above
            }
        }
    }
}
