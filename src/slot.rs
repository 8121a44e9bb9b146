//! Ring slots: fixed-capacity record scratch buffers.
//!
//! A slot is mutated by exactly one thread at a time; ownership transfers
//! only through sequence publication, so nothing in here synchronizes.
//! Payload overflow truncates the record and stamps a marker rather than
//! failing the producer; template misuse is remembered and surfaced at
//! commit.

use std::sync::Arc;

use crate::buffer::{Buf, Payload};
use crate::error::{Overflow, PatternError};
use crate::fmt;
use crate::level::LogLevel;
use crate::pattern::Pattern;

pub(crate) const MAX_THREAD_NAME: usize = 64;

pub struct Slot {
    level: LogLevel,
    timestamp_millis: i64,
    logger_id: u32,
    thread_name: [u8; MAX_THREAD_NAME],
    thread_name_len: u8,
    payload: Payload,
    pattern: Option<Arc<Pattern>>,
    pattern_pos: usize,
    bound: usize,
    pending_placeholder: bool,
    misuse: Option<PatternError>,
    truncated: bool,
}

impl Slot {
    pub(crate) fn new(payload_capacity: usize, multibyte: bool) -> Self {
        Slot {
            level: LogLevel::Trace,
            timestamp_millis: 0,
            logger_id: 0,
            thread_name: [0; MAX_THREAD_NAME],
            thread_name_len: 0,
            payload: Payload::new(payload_capacity, multibyte),
            pattern: None,
            pattern_pos: 0,
            bound: 0,
            pending_placeholder: false,
            misuse: None,
            truncated: false,
        }
    }

    /// Prepare the slot for a fresh record. Called by the claiming
    /// producer before anything else touches the payload.
    pub(crate) fn reset(&mut self, level: LogLevel, timestamp_millis: i64, logger_id: u32, thread: &str) {
        self.level = level;
        self.timestamp_millis = timestamp_millis;
        self.logger_id = logger_id;
        let mut cut = thread.len().min(MAX_THREAD_NAME);
        while cut > 0 && !thread.is_char_boundary(cut) {
            cut -= 1;
        }
        self.thread_name[..cut].copy_from_slice(&thread.as_bytes()[..cut]);
        self.thread_name_len = cut as u8;
        self.payload.clear();
        self.pattern = None;
        self.pattern_pos = 0;
        self.bound = 0;
        self.pending_placeholder = false;
        self.misuse = None;
        self.truncated = false;
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn logger_id(&self) -> u32 {
        self.logger_id
    }

    pub fn thread_name(&self) -> &str {
        std::str::from_utf8(&self.thread_name[..self.thread_name_len as usize]).unwrap_or("")
    }

    /// Rendered payload. UTF-8 in multi-byte mode, raw bytes otherwise.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    fn push(&mut self, write: impl FnOnce(&mut Payload) -> Result<(), Overflow>) {
        if self.truncated {
            return;
        }
        if write(&mut self.payload).is_err() {
            self.truncated = true;
        }
    }

    pub(crate) fn append_i64(&mut self, v: i64) {
        self.push(|p| fmt::append_i64(p, v));
    }

    pub(crate) fn append_i32(&mut self, v: i32) {
        self.push(|p| fmt::append_i32(p, v));
    }

    pub(crate) fn append_byte(&mut self, v: i8) {
        self.push(|p| fmt::append_byte(p, v));
    }

    pub(crate) fn append_char(&mut self, v: char) {
        self.push(|p| fmt::append_char(p, v));
    }

    pub(crate) fn append_f64(&mut self, v: f64) {
        self.push(|p| fmt::append_f64(p, v));
    }

    pub(crate) fn append_f64_digits(&mut self, v: f64, digits: usize) {
        self.push(|p| fmt::append_f64_digits(p, v, digits));
    }

    pub(crate) fn append_bool(&mut self, v: bool) {
        self.push(|p| p.put_str(if v { "true" } else { "false" }));
    }

    pub(crate) fn append_str(&mut self, s: &str) {
        if self.truncated {
            return;
        }
        if self.payload.put_str_lossy(s) {
            self.truncated = true;
        }
    }

    /// Render `format_args!` output into the payload, truncating on
    /// overflow. Used by the `log` bridge.
    pub(crate) fn append_args(&mut self, args: std::fmt::Arguments<'_>) {
        use std::fmt::Write;
        let mut w = LossyWriter {
            payload: &mut self.payload,
            truncated: &mut self.truncated,
        };
        let _ = w.write_fmt(args);
    }

    /// Attach a template and emit its leading literal run.
    pub(crate) fn set_pattern(&mut self, pattern: &Arc<Pattern>) {
        self.pattern = Some(Arc::clone(pattern));
        self.pattern_pos = 0;
        self.bound = 0;
        self.pending_placeholder = false;
        self.advance_template();
    }

    fn advance_template(&mut self) {
        let Some(pattern) = self.pattern.clone() else {
            return;
        };
        if self.truncated {
            // Keep the cursor honest even when the text no longer fits.
            let mut sink = NullBuf;
            if let Ok((pos, hit)) = pattern.emit_literal_run(self.pattern_pos, &mut sink) {
                self.pattern_pos = pos;
                self.pending_placeholder = hit;
            }
            return;
        }
        match pattern.emit_literal_run(self.pattern_pos, &mut self.payload) {
            Ok((pos, hit)) => {
                self.pattern_pos = pos;
                self.pending_placeholder = hit;
            }
            Err(_) => {
                self.truncated = true;
                self.advance_template();
            }
        }
    }

    fn bind(&mut self, write: impl FnOnce(&mut Payload) -> Result<(), Overflow>) {
        let expected = match &self.pattern {
            Some(p) => p.placeholders(),
            None => {
                self.misuse
                    .get_or_insert(PatternError::TooManyValues { expected: 0 });
                return;
            }
        };
        if !self.pending_placeholder {
            self.misuse
                .get_or_insert(PatternError::TooManyValues { expected });
            return;
        }
        self.push(write);
        self.bound += 1;
        self.pending_placeholder = false;
        self.advance_template();
    }

    pub(crate) fn with_i64(&mut self, v: i64) {
        self.bind(|p| fmt::append_i64(p, v));
    }

    pub(crate) fn with_i32(&mut self, v: i32) {
        self.bind(|p| fmt::append_i32(p, v));
    }

    pub(crate) fn with_f64(&mut self, v: f64) {
        self.bind(|p| fmt::append_f64(p, v));
    }

    pub(crate) fn with_char(&mut self, v: char) {
        self.bind(|p| fmt::append_char(p, v));
    }

    pub(crate) fn with_bool(&mut self, v: bool) {
        self.bind(|p| p.put_str(if v { "true" } else { "false" }));
    }

    pub(crate) fn with_str(&mut self, s: &str) {
        self.bind(|p| p.put_str(s));
    }

    /// Validate template state and seal the payload for publication.
    ///
    /// On misuse the payload is replaced with a record describing the
    /// problem, so the claimed sequence still carries something readable,
    /// and the error is returned to the producer.
    pub(crate) fn finish(&mut self) -> Result<(), PatternError> {
        let error = self.misuse.or_else(|| match &self.pattern {
            Some(p) if self.bound < p.placeholders() => Some(PatternError::UnboundPlaceholders {
                expected: p.placeholders(),
                bound: self.bound,
            }),
            _ => None,
        });

        if let Some(e) = error {
            self.payload.clear();
            self.truncated = false;
            let _ = self.payload.put_str("pattern misuse: ");
            match e {
                PatternError::UnboundPlaceholders { expected, bound } => {
                    let _ = fmt::append_i64(&mut self.payload, bound as i64);
                    let _ = self.payload.put_str(" of ");
                    let _ = fmt::append_i64(&mut self.payload, expected as i64);
                    let _ = self.payload.put_str(" placeholders bound");
                }
                PatternError::TooManyValues { expected } => {
                    let _ = self.payload.put_str("value bound past the last of ");
                    let _ = fmt::append_i64(&mut self.payload, expected as i64);
                    let _ = self.payload.put_str(" placeholders");
                }
                PatternError::Malformed { at } => {
                    let _ = self.payload.put_str("stray '%' at byte ");
                    let _ = fmt::append_i64(&mut self.payload, at as i64);
                }
            }
            if let Some(p) = &self.pattern {
                let _ = self.payload.put_str(" in \"");
                self.payload.put_str_lossy(p.raw());
                let _ = self.payload.put_str("\"");
            }
            return Err(e);
        }

        if self.truncated {
            self.payload.seal_truncated();
        }
        Ok(())
    }
}

struct LossyWriter<'a> {
    payload: &'a mut Payload,
    truncated: &'a mut bool,
}

impl std::fmt::Write for LossyWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if !*self.truncated && self.payload.put_str_lossy(s) {
            *self.truncated = true;
        }
        Ok(())
    }
}

/// Byte sink that discards everything; keeps template cursors moving after
/// the payload has already overflowed.
struct NullBuf;

impl Buf for NullBuf {
    fn capacity(&self) -> usize {
        usize::MAX
    }
    fn position(&self) -> usize {
        0
    }
    fn clear(&mut self) {}
    fn as_bytes(&self) -> &[u8] {
        &[]
    }
    fn put_ascii(&mut self, _: u8) -> Result<(), Overflow> {
        Ok(())
    }
    fn put_char(&mut self, _: char) -> Result<(), Overflow> {
        Ok(())
    }
    fn put_str(&mut self, _: &str) -> Result<(), Overflow> {
        Ok(())
    }
    fn put_str_lossy(&mut self, _: &str) -> bool {
        false
    }
    fn truncate_to(&mut self, _: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_slot() -> Slot {
        let mut slot = Slot::new(64, false);
        slot.reset(LogLevel::Info, 0, 0, "main");
        slot
    }

    fn payload_str(slot: &Slot) -> String {
        String::from_utf8(slot.payload_bytes().to_vec()).unwrap()
    }

    #[test]
    fn appends_accumulate() {
        let mut slot = test_slot();
        slot.append_str("x=");
        slot.append_i64(-42);
        slot.append_char(' ');
        slot.append_f64(1.5);
        slot.append_char(' ');
        slot.append_bool(true);
        assert!(slot.finish().is_ok());
        assert_eq!(payload_str(&slot), "x=-42 1.5 true");
    }

    #[test]
    fn template_binds_in_order() {
        let mut slot = test_slot();
        let pattern = Arc::new(Pattern::parse("a=%s, b=%s").unwrap());
        slot.set_pattern(&pattern);
        slot.with_i64(1);
        slot.with_i64(2);
        assert!(slot.finish().is_ok());
        assert_eq!(payload_str(&slot), "a=1, b=2");
    }

    #[test]
    fn unbound_placeholder_fails_commit() {
        let mut slot = test_slot();
        let pattern = Arc::new(Pattern::parse("a=%s, b=%s").unwrap());
        slot.set_pattern(&pattern);
        slot.with_i64(1);
        let err = slot.finish().unwrap_err();
        assert_eq!(
            err,
            PatternError::UnboundPlaceholders { expected: 2, bound: 1 }
        );
        assert!(payload_str(&slot).starts_with("pattern misuse:"));
    }

    #[test]
    fn extra_bind_fails_commit() {
        let mut slot = test_slot();
        let pattern = Arc::new(Pattern::parse("v=%s").unwrap());
        slot.set_pattern(&pattern);
        slot.with_i64(1);
        slot.with_i64(2);
        let err = slot.finish().unwrap_err();
        assert_eq!(err, PatternError::TooManyValues { expected: 1 });
    }

    #[test]
    fn escaped_percent_renders_literally() {
        let mut slot = test_slot();
        let pattern = Arc::new(Pattern::parse("%s%% done").unwrap());
        slot.set_pattern(&pattern);
        slot.with_i64(85);
        assert!(slot.finish().is_ok());
        assert_eq!(payload_str(&slot), "85% done");
    }

    #[test]
    fn overflow_truncates_with_marker() {
        let mut slot = Slot::new(8, false);
        slot.reset(LogLevel::Info, 0, 0, "main");
        slot.append_str("abcdef");
        slot.append_i64(123_456);
        slot.append_str("ignored");
        assert!(slot.finish().is_ok());
        let s = payload_str(&slot);
        assert_eq!(s.len(), 8);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn reset_clears_previous_record() {
        let mut slot = test_slot();
        slot.append_str("first");
        assert!(slot.finish().is_ok());
        slot.reset(LogLevel::Warn, 7, 3, "worker-1");
        slot.append_str("second");
        assert!(slot.finish().is_ok());
        assert_eq!(payload_str(&slot), "second");
        assert_eq!(slot.level(), LogLevel::Warn);
        assert_eq!(slot.timestamp_millis(), 7);
        assert_eq!(slot.logger_id(), 3);
        assert_eq!(slot.thread_name(), "worker-1");
    }

    #[test]
    fn long_thread_names_are_bounded() {
        let mut slot = test_slot();
        let long = "t".repeat(MAX_THREAD_NAME + 10);
        slot.reset(LogLevel::Info, 0, 0, &long);
        assert_eq!(slot.thread_name().len(), MAX_THREAD_NAME);
    }

    #[test]
    fn format_args_render_through() {
        let mut slot = test_slot();
        slot.append_args(format_args!("n={} s={}", 5, "ok"));
        assert!(slot.finish().is_ok());
        assert_eq!(payload_str(&slot), "n=5 s=ok");
    }
}
