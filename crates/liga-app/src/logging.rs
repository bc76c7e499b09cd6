// Tracing setup. The scheduler logs to a file; one-shot commands log to
// stderr so their output stays readable.

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use liga_core::config::Config;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "liga=info,liga_app=info,liga_core=info,warn";
const LOG_FILE: &str = "liga.log";

/// Where the scheduler writes its log. A relative `log_dir` resolves against
/// `base_dir`; an empty one falls back to the platform data directory.
pub fn log_dir(base_dir: &Path, config: &Config) -> PathBuf {
    let configured = config.scheduler.log_dir.trim();
    if !configured.is_empty() {
        return base_dir.join(configured);
    }
    match ProjectDirs::from("", "", "liga") {
        Some(dirs) => dirs.data_dir().join("logs"),
        None => base_dir.join("logs"),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to `dir/liga.log`, creating the directory. Returns the file path.
pub fn init_file(dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(path)
}

pub fn init_stderr() -> anyhow::Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}
