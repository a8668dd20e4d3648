use std::sync::OnceLock;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::PROGRAM_LOG_LEVEL;

/// Minimal stderr logger for the CLI and library consumers.
///
/// Interactive output goes to stdout; diagnostics must stay on stderr so
/// query results remain pipeable.
pub struct Logger {
    level: Level,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{} {:5} {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Install the logger at the level named by `SIFT_LOG_LEVEL` (default
/// `warn`). Safe to call more than once; only the first call installs.
pub fn init() -> Result<(), SetLoggerError> {
    let level = std::env::var(PROGRAM_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .and_then(|filter| filter.to_level())
        .unwrap_or(Level::Warn);
    init_with_level(level)
}

pub fn init_with_level(level: Level) -> Result<(), SetLoggerError> {
    static LOGGER: OnceLock<Logger> = OnceLock::new();

    // Only the first call may install; a later call with a different
    // level must not desync log::max_level from the installed logger's
    // own threshold.
    let first_call = LOGGER.get().is_none();
    let logger = LOGGER.get_or_init(|| Logger { level });

    if first_call {
        log::set_logger(logger)?;
        log::set_max_level(logger.level.to_level_filter());
    }

    Ok(())
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
