//! Error types, one enum per failure domain.
//!
//! Producer-side failures are plain values that the façade may silently
//! drop; nothing on the hot path panics or unwinds into application code.

use std::io;

/// Failures while assembling a logger service.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no configured sink for appender")]
    NoConfiguredSink,
    #[error("ring entries must be a power of two, got {0}")]
    InvalidRingSize(usize),
    #[error("slot payload capacity too small: {0} bytes (minimum 16)")]
    SlotCapacityTooSmall(usize),
    #[error("unrecognized log level: {0}")]
    BadLevel(String),
    #[error("unrecognized time zone id: {0}")]
    BadTimeZone(String),
    #[error("malformed value for {key}: {value}")]
    BadProperty { key: String, value: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    SetLogger(#[from] log::SetLoggerError),
}

/// A buffer did not have room for the requested write.
///
/// The write position is left where it was before the call; no partial
/// value is ever visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer overflow: needed {needed} bytes, {remaining} remaining")]
pub struct Overflow {
    pub needed: usize,
    pub remaining: usize,
}

/// Ring acquisition failures surfaced to producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// The ring is full and the caller asked not to block.
    #[error("ring full")]
    WouldBlock,
    /// The service is halting; producers should drop the record.
    #[error("logger service is shutting down")]
    Shutdown,
}

/// Template misuse detected while populating or committing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern has {expected} placeholders, only {bound} bound at commit")]
    UnboundPlaceholders { expected: usize, bound: usize },
    #[error("value bound past the last of {expected} placeholders")]
    TooManyValues { expected: usize },
    #[error("stray '%' at byte {at}, use %% for a literal percent")]
    Malformed { at: usize },
}

/// Fallback handler for consumer-side failures (sink I/O, discarded
/// shutdown tails). Never routed through the ring itself.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_error(&self, context: &str, error: &io::Error);
}

/// Default fallback: one line to stderr per failure.
#[derive(Debug, Default)]
pub struct StderrHandler;

impl ErrorHandler for StderrHandler {
    fn on_error(&self, context: &str, error: &io::Error) {
        eprintln!("gflog: {context}: {error}");
    }
}
