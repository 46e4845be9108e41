use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the file logger named by `SETTINGS_PANE_LOG`. The terminal belongs
/// to the UI, so there is no stderr fallback: without the variable nothing is
/// installed and `tracing` macros are no-ops.
pub fn init() -> Result<bool> {
    let Some(path) = std::env::var_os("SETTINGS_PANE_LOG") else {
        return Ok(false);
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {path:?}"))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(tracing::Level::INFO.into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;
    tracing::info!(log = ?path, "logging initialised");
    Ok(true)
}
