//! Tracing subscriber setup for the server binary

use std::path::Path;

use burrow_core::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber described by `config`
///
/// With `config.file` set, logs go to a daily-rolling file through a
/// non-blocking writer; the returned guard must live until exit so buffered
/// lines are flushed. Otherwise logs go to stderr.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| Error::Config(format!("Invalid log level {:?}: {e}", config.level)))?;

    let Some(file) = &config.file else {
        match config.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(std::io::stderr)
                .init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init(),
        }
        return Ok(None);
    };

    let (directory, file_name) = split_log_path(file)?;
    std::fs::create_dir_all(directory)
        .map_err(|e| Error::Config(format!("Failed to create log directory: {e}")))?;

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(writer)
            .init(),
    }

    Ok(Some(guard))
}

fn split_log_path(file: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let file_name = file
        .file_name()
        .ok_or_else(|| Error::Config(format!("Log file has no name: {}", file.display())))?;
    let directory = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((directory, file_name))
}
