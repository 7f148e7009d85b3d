//! Quill CLI - serves `read_file` / `write_file` over stdin/stdout.
//!
//! ```text
//! main() -> init_tracing() -> QuillConfig::load() -> tool_settings()
//!        -> register_builtins() -> run_session(stdin, stdout)
//! ```
//!
//! Stdout carries protocol responses only. Logs go to a file or nowhere.

mod session;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use quill_config::QuillConfig;
use quill_tools::{ToolRegistry, register_builtins};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use session::run_session;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with responses.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.quill/logs/quill.log
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".quill").join("logs").join("quill.log"));
    }

    // Fallback: ./.quill/logs/quill.log
    candidates.push(PathBuf::from(".quill").join("logs").join("quill.log"));

    candidates
}

fn main() -> Result<()> {
    init_tracing();

    let config = QuillConfig::load().context("failed to load config")?;
    let settings = config
        .tool_settings()
        .context("failed to set up sandbox")?;

    let mut registry = ToolRegistry::default();
    register_builtins(&mut registry, &settings).context("failed to register tools")?;
    tracing::info!(
        root = %settings.sandbox.root().display(),
        "Serving file tools"
    );

    run_session(&registry, io::stdin().lock(), io::stdout().lock())
        .context("session I/O failed")?;
    Ok(())
}
