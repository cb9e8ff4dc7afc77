//! Startup wiring: logging and signal handling.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use log::LevelFilter;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{LogFormat, Opt};

/// Errors raised during process initialization.
#[derive(Debug)]
pub enum InitializationError {
    /// The logger was already installed or failed to install.
    LoggerError(log::SetLoggerError),
    /// The `-l` log file could not be opened.
    LogFileError(std::io::Error),
}

impl From<log::SetLoggerError> for InitializationError {
    fn from(err: log::SetLoggerError) -> InitializationError {
        InitializationError::LoggerError(err)
    }
}

impl fmt::Display for InitializationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InitializationError::LoggerError(e) => {
                write!(f, "Logger initialization error: {e}")
            }
            InitializationError::LogFileError(e) => {
                write!(f, "Failed to open log file: {e}")
            }
        }
    }
}

impl std::error::Error for InitializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitializationError::LoggerError(e) => Some(e),
            InitializationError::LogFileError(e) => Some(e),
        }
    }
}

/// Initializes the logger from CLI options.
///
/// `-v` forces debug level (per-attempt query noise); `-q` raises the floor
/// to warnings. Otherwise `--log-level` applies. Logs go to stderr unless
/// `-l` names a file.
///
/// # Errors
///
/// Returns [`InitializationError`] when the log file cannot be opened or a
/// logger is already installed.
pub fn init_logger(opt: &Opt) -> Result<(), InitializationError> {
    let level = if opt.verbose {
        LevelFilter::Debug
    } else if opt.quiet {
        LevelFilter::Warn
    } else {
        opt.log_level.into()
    };

    init_logger_with(level, opt.log_format, opt.log_file.as_deref())
}

/// Initializes the logger with explicit settings.
///
/// Supports a colored plain format and a JSON line format for structured
/// collection.
///
/// # Errors
///
/// See [`init_logger`].
pub fn init_logger_with(
    level: LevelFilter,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::new();

    builder.filter_level(level);
    // hickory emits warnings for malformed upstream datagrams it already
    // handles; keep them out of normal runs.
    builder.filter_module("hickory_proto", LevelFilter::Error);
    builder.filter_module("dnsweep", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{{\"ts\":{},\"level\":\"{}\",\"target\":\"{}\",\"msg\":{}}}",
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    serde_json::to_string(&record.args().to_string())
                        .unwrap_or_else(|_| "\"\"".into())
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let colored_level = match level {
                    log::Level::Error => level.to_string().red(),
                    log::Level::Warn => level.to_string().yellow(),
                    log::Level::Info => level.to_string().green(),
                    log::Level::Debug => level.to_string().blue(),
                    log::Level::Trace => level.to_string().purple(),
                };

                writeln!(
                    buf,
                    "{} [{}] {}",
                    record.target().cyan(),
                    colored_level,
                    record.args()
                )
            });
        }
    }

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(InitializationError::LogFileError)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        // File sinks get no ANSI colors.
        colored::control::set_override(false);
    }

    builder.init();

    Ok(())
}

/// Spawns the signal listener that drives graceful shutdown.
///
/// The first SIGINT or SIGTERM cancels the token; every pipeline task
/// observes it and drains.
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received shutdown signal, stopping...");
            }
            () = wait_for_sigterm() => {
                log::info!("Received SIGTERM, stopping...");
            }
            () = cancel.cancelled() => return,
        }
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            log::warn!("Failed to register SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
