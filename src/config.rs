//! Explicit configuration values.
//!
//! There is no process-wide lookup: a [`Config`] is built (from defaults,
//! from dotted properties, or by hand) and passed to the service builder,
//! so tests can inject their own without touching a global.

use std::time::Duration;

use time::UtcOffset;

use crate::error::BuildError;
use crate::level::LogLevel;
use crate::wait::WaitStrategy;

/// Who claims sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerMode {
    /// Exactly one thread logs. The claim cursor advances with a plain
    /// store; violating the contract corrupts the ring.
    Single,
    /// Any number of threads log; claims go through CAS and per-cell
    /// availability markers.
    #[default]
    Multi,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Total ring payload allocation in bytes, split evenly across the
    /// slots.
    pub buffer_size: usize,
    /// Ring slot count; must be a power of two.
    pub entries: usize,
    /// Character payload buffers instead of byte buffers.
    pub multibyte: bool,
    /// Default minimum level for loggers handed out by the service.
    pub log_level: LogLevel,
    /// Time zone offset applied by the header layout.
    pub time_zone: UtcOffset,
    /// Locale hint, surfaced for custom layouts; the built-in layouts
    /// render numerically and ignore it.
    pub language: Option<String>,
    /// Layout pattern string. `%m%n` selects the message-only layout,
    /// anything else the full header layout.
    pub pattern: String,
    /// Flush the output buffer after every record.
    pub immediate_flush: bool,
    /// Buffered byte count that forces a flush.
    pub buffered_io_threshold: usize,
    /// How long blocking waits park before re-checking.
    pub await_timeout: Duration,
    pub producer_mode: ProducerMode,
    pub wait_strategy: WaitStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: 1 << 20,
            entries: 1024,
            multibyte: false,
            log_level: LogLevel::Error,
            time_zone: UtcOffset::UTC,
            language: None,
            pattern: "%m%n".to_string(),
            immediate_flush: false,
            buffered_io_threshold: 8192,
            await_timeout: Duration::from_millis(10),
            producer_mode: ProducerMode::Multi,
            wait_strategy: WaitStrategy::Blocking,
        }
    }
}

impl Config {
    /// Build a config from dotted `gflogger.*` properties. Unrecognized
    /// keys are ignored; malformed values fail.
    pub fn from_properties<'a, I>(pairs: I) -> Result<Config, BuildError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Config::default();
        for (key, value) in pairs {
            match key {
                "gflogger.buffer.size" => config.buffer_size = parse_usize(key, value)?,
                "gflogger.multibyte" => config.multibyte = parse_bool(key, value)?,
                "gflogger.loglevel" => {
                    config.log_level = LogLevel::parse(value)
                        .ok_or_else(|| BuildError::BadLevel(value.to_string()))?;
                }
                "gflogger.timeZoneId" => config.time_zone = parse_offset(value)?,
                "gflogger.language" => config.language = Some(value.to_string()),
                "gflogger.pattern" => config.pattern = value.to_string(),
                "gflogger.immediateFlush" => config.immediate_flush = parse_bool(key, value)?,
                "gflogger.bufferedIOThreshold" => {
                    config.buffered_io_threshold = parse_usize(key, value)?;
                }
                "gflogger.awaitTimeout" => {
                    config.await_timeout = Duration::from_millis(parse_usize(key, value)? as u64);
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// Payload bytes available to each slot.
    pub fn slot_capacity(&self) -> usize {
        (self.buffer_size / self.entries.max(1)).max(1)
    }

    pub(crate) fn validate(&self) -> Result<(), BuildError> {
        if !self.entries.is_power_of_two() {
            return Err(BuildError::InvalidRingSize(self.entries));
        }
        let capacity = self.slot_capacity();
        if capacity < 16 {
            return Err(BuildError::SlotCapacityTooSmall(capacity));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, BuildError> {
    value.trim().parse().map_err(|_| BuildError::BadProperty {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BuildError> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(BuildError::BadProperty {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Accepts `UTC`, `GMT`, `Z`, and fixed offsets like `+02:00` or
/// `GMT-05:30`.
fn parse_offset(value: &str) -> Result<UtcOffset, BuildError> {
    let s = value.trim();
    let bad = || BuildError::BadTimeZone(value.to_string());
    let s = s
        .strip_prefix("GMT")
        .or_else(|| s.strip_prefix("UTC"))
        .unwrap_or(s);
    if s.is_empty() || s.eq_ignore_ascii_case("z") {
        return Ok(UtcOffset::UTC);
    }
    let (sign, rest) = match s.as_bytes()[0] {
        b'+' => (1i8, &s[1..]),
        b'-' => (-1i8, &s[1..]),
        _ => return Err(bad()),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i8 = hours.parse().map_err(|_| bad())?;
    let minutes: i8 = minutes.parse().map_err(|_| bad())?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|_| bad())
}
