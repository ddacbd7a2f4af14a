//! Diagnostic logging to a local JSONL file.
//!
//! The interactive loop owns stdout, so traces go to a file. The path comes
//! from `--log-file`, then `$HEARTH_TRACE_LOG`, then `hearth_trace.jsonl` in
//! the temp directory; `--no-logs` turns the whole thing off. A path that
//! cannot be opened degrades to no logging rather than failing startup.

use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

use crate::config::AppConfig;

const TRACE_LOG_ENV: &str = "HEARTH_TRACE_LOG";

static ACTIVE: OnceLock<bool> = OnceLock::new();

pub fn resolve_log_path(config: &AppConfig) -> PathBuf {
    if let Some(path) = &config.log_file {
        return path.clone();
    }
    env::var(TRACE_LOG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("hearth_trace.jsonl"))
}

/// Install the global JSON file subscriber once. Returns whether logging is
/// active after the call.
pub fn init_tracing(config: &AppConfig) -> bool {
    if config.no_logs {
        return false;
    }
    *ACTIVE.get_or_init(|| install_file_subscriber(&resolve_log_path(config)))
}

fn install_file_subscriber(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return false;
    };
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    true
}
