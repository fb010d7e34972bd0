//! Config command handlers

use anyhow::{bail, Context, Result};

use snip_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "api_url": config.api_url,
                    "user": config.user,
                    "debounce_ms": config.debounce_ms,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:    {}", config.data_dir.display());
            println!(
                "  api_url:     {}",
                config.api_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  user:        {}",
                config.user.as_deref().unwrap_or("(not set)")
            );
            println!("  debounce_ms: {}", config.debounce_ms);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "api_url" => {
            config.api_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        "user" => {
            config.user = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        "debounce_ms" => {
            config.debounce_ms = value
                .parse()
                .context("Invalid value for debounce_ms. Use a number of milliseconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, api_url, user, debounce_ms",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
