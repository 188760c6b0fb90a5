//! Structured logging: console plus a daily rolling file under the data dir.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// Rolling file prefix; files are named `pos.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "pos";

const DEFAULT_FILTER: &str = "info,juice_pos_lib=debug";

/// Install the global subscriber. Keep the returned guard alive until exit;
/// dropping it flushes the file writer.
///
/// The file gets everything `RUST_LOG` allows, as JSON lines when `json` is
/// set. The console only shows warnings unless `verbose` is set, so the till
/// prompt stays readable.
pub fn init_logging(log_dir: &Path, verbose: bool, json: bool) -> WorkerGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    prune_old_logs(log_dir);
    let _ = fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (json_layer, text_layer) = if json {
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);
        (None, Some(layer))
    };
    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .init();

    guard
}

/// Prune old log files, keeping only the most recent [`MAX_LOG_FILES`].
pub fn prune_old_logs(log_dir: &Path) {
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("pos.") || name == "pos.log");
            if is_log {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(std::time::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}
