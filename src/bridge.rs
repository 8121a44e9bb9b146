//! Adapter from the `log` facade into the ring, so applications using the
//! standard macros emit through the garbage-free path.

use log::{LevelFilter, Metadata, Record, SetLoggerError};

use crate::facade::Logger;
use crate::level::LogLevel;

pub struct LogBridge {
    logger: Logger,
}

impl LogBridge {
    pub fn new(logger: Logger) -> Self {
        LogBridge { logger }
    }
}

fn map_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger.enabled(map_level(metadata.level()))
    }

    fn log(&self, record: &Record) {
        let level = map_level(record.level());
        if let Some(mut builder) = self.logger.record(level) {
            builder.append_args(*record.args());
            let _ = builder.commit();
        }
    }

    fn flush(&self) {
        // Flushing is the consumer's business; nothing to do here.
    }
}

/// Route the `log` macros into `logger`. One-time, process-wide.
pub fn install(logger: Logger, max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(LogBridge::new(logger)))?;
    log::set_max_level(max_level);
    Ok(())
}
