use crate::error::{Result, SpeedError};
use crate::settings::APP_NAME;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Where log lines go. The dashboard owns the terminal, so it logs to a file.
#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Installs the global subscriber. `RUST_LOG` overrides `level` when set.
///
/// The returned guard flushes the file writer on drop and must outlive the
/// program's logging.
pub fn init_logger(level: LogLevel, target: LogTarget) -> Result<Option<WorkerGuard>> {
    let level: Level = level.into();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{APP_NAME}={},warn", level.as_str().to_lowercase()))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match target {
        LogTarget::Stderr => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| SpeedError::Logger(e.to_string()))?;
            Ok(None)
        }
        LogTarget::File(path) => {
            let (dir, file_name) = split_log_path(&path)?;
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| SpeedError::Logger(e.to_string()))?;
            Ok(Some(guard))
        }
    }
}

pub fn default_log_file() -> PathBuf {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_local_dir().join(format!("{APP_NAME}.log")))
        .unwrap_or_else(|| PathBuf::from(format!("{APP_NAME}.log")))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| SpeedError::Logger(format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}
