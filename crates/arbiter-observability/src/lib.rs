//! Run-scoped structured logging: always a compact stderr layer, plus an
//! optional JSON file layer under `runs/<run_id>/logs/` when `--debug` is
//! set. There is no retention sweep here (daily-rotation + N-day cleanup is
//! a long-lived-process concern); a run directory is write-once and lives
//! until the user removes it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize)]
pub struct LoggingInitInfo {
    pub run_id: String,
    pub logs_dir: Option<String>,
    pub initialized_at: DateTime<Utc>,
}

/// A structured observability event carrying only the fields this engine
/// actually needs (no session/message/provider-session fields, since a run
/// has no chat session concept).
#[derive(Debug, Clone, Serialize)]
pub struct ObservabilityEvent<'a> {
    pub event: &'a str,
    pub component: &'a str,
    pub run_id: &'a str,
    pub trial_id: Option<u32>,
    pub batch_number: Option<u32>,
    pub status: Option<&'a str>,
    pub detail: Option<&'a str>,
}

/// Redacts free text to a length+hash fingerprint, for logging question
/// text or model output without leaking content into log files.
pub fn redact_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("[redacted len={} sha256={}]", trimmed.len(), short_hash(trimmed))
}

pub fn short_hash(input: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

pub fn emit_event(level: Level, event: ObservabilityEvent<'_>) {
    match level {
        Level::ERROR => tracing::error!(
            target: "arbiter.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id,
            trial_id = event.trial_id,
            batch_number = event.batch_number,
            status = event.status.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
        Level::WARN => tracing::warn!(
            target: "arbiter.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id,
            trial_id = event.trial_id,
            batch_number = event.batch_number,
            status = event.status.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
        _ => tracing::info!(
            target: "arbiter.obs",
            component = event.component,
            event = event.event,
            run_id = event.run_id,
            trial_id = event.trial_id,
            batch_number = event.batch_number,
            status = event.status.unwrap_or(""),
            detail = event.detail.unwrap_or(""),
            "observability_event"
        ),
    }
}

/// Initializes logging for one run. Always installs a compact stderr layer;
/// when `debug` is true, also writes JSON-structured lines to
/// `logs_dir/arbiter.run.jsonl`. The returned `WorkerGuard` must be held for
/// the lifetime of the run so the non-blocking file writer flushes on drop.
pub fn init_run_logging(
    run_id: &str,
    logs_dir: Option<&Path>,
    debug: bool,
) -> anyhow::Result<(Option<WorkerGuard>, LoggingInitInfo)> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_ansi(true);

    let (file_layer, guard, logs_dir_str) = if debug {
        let dir = logs_dir.unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let file_appender = tracing_appender::rolling::Builder::new()
            .rotation(tracing_appender::rolling::Rotation::NEVER)
            .filename_prefix("arbiter.run")
            .filename_suffix("jsonl")
            .build(dir)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_current_span(false)
            .with_span_list(false);
        (Some(layer), Some(guard), Some(dir.display().to_string()))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    let info = LoggingInitInfo {
        run_id: run_id.to_string(),
        logs_dir: logs_dir_str,
        initialized_at: Utc::now(),
    };

    Ok((guard, info))
}

pub fn canonical_logs_dir(run_dir: &Path) -> PathBuf {
    run_dir.join("logs")
}
