//! Forwarding of `log` records to a logger implemented by the host.
//!
//! Hosts (Swift, Kotlin, or a Rust binary) implement [`Logger`] and install it
//! once with [`set_logger`]. Debug and trace records are only forwarded when
//! they originate from this crate; warnings and errors are always forwarded.

use std::sync::{Arc, OnceLock};

/// Receives log messages from the core.
///
/// ```rust
/// use passkit_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
///
/// ## Swift
///
/// ```swift
/// final class PasskitLoggerBridge: PasskitCore.Logger {
///     func log(level: PasskitCore.LogLevel, message: String) {
///         os_log("%{public}@", message)
///     }
/// }
///
/// PasskitCore.setLogger(logger: PasskitLoggerBridge()) // once, at startup
/// ```
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait Logger: Sync + Send {
    /// Records `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very detailed tracing, e.g. lifecycle transitions.
    Trace,
    /// Debugging information such as extracted key coordinates.
    Debug,
    /// Progress of a ceremony.
    Info,
    /// A ceremony failed.
    Warn,
    /// An unexpected internal failure.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info || metadata.target().starts_with("passkit")
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Installs `logger` as the destination of every `log` record.
///
/// Only the first call has an effect. If another `log` implementation is
/// already installed in the process, records keep going there.
#[cfg_attr(feature = "ffi", uniffi::export)]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::warn!("passkit logger already set");
        return;
    }

    static FORWARDER: ForeignLogger = ForeignLogger;
    match log::set_logger(&FORWARDER) {
        Ok(()) => log::set_max_level(log::LevelFilter::Trace),
        Err(e) => eprintln!("failed to install passkit logger: {e}"),
    }
}
