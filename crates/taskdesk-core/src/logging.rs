//! Tracing subscriber setup.
//!
//! Filter resolution: `TASKDESK_LOG` env var, then `log.level` from config,
//! then `warn`. With `log.file` enabled, output goes to
//! `${TASKDESK_HOME}/logs/taskdesk.log` so it never mixes with command output.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, paths};

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "TASKDESK_LOG";

const LOG_FILE: &str = "taskdesk.log";
const FALLBACK_LEVEL: &str = "warn";

/// Keeps the background log writer alive. Drop it last.
#[must_use]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a subscriber is already set.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let env_directive = std::env::var(LOG_ENV).ok();
    let filter = build_filter(env_directive.as_deref(), &config.level);

    if config.file {
        let dir = paths::logs_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
        Ok(LogGuard {
            _worker: Some(guard),
        })
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
        Ok(LogGuard { _worker: None })
    }
}

fn build_filter(env_directive: Option<&str>, configured: &str) -> EnvFilter {
    env_directive
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}
