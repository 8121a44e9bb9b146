//! The producer façade: named loggers handing out record builders.
//!
//! A [`RecordBuilder`] wraps one claimed slot. Population is plain method
//! chaining; the publish happens exactly once, at [`RecordBuilder::commit`]
//! or when the builder drops, since an abandoned claim would otherwise gate
//! the consumer forever in multi-producer mode.

use std::sync::{Arc, RwLock};

use crate::clock::Clock;
use crate::error::{ClaimError, PatternError};
use crate::level::LogLevel;
use crate::pattern::Pattern;
use crate::ring::Ring;
use crate::slot::Slot;
use crate::wait::WaitSignal;

/// Logger names interned at setup time; ids resolve back to names for the
/// header layout. Never touched between claim and publish.
pub(crate) struct Registry {
    names: RwLock<Vec<Box<str>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            names: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn intern(&self, name: &str) -> u32 {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = names.iter().position(|n| &**n == name) {
            return id as u32;
        }
        names.push(name.into());
        (names.len() - 1) as u32
    }

    pub(crate) fn with_name<R>(&self, id: u32, f: impl FnOnce(&str) -> R) -> R {
        let names = self.names.read().unwrap_or_else(|e| e.into_inner());
        f(names.get(id as usize).map(|n| &**n).unwrap_or(""))
    }
}

pub(crate) struct Shared {
    pub(crate) ring: Arc<Ring>,
    pub(crate) signal: WaitSignal,
    pub(crate) registry: Arc<Registry>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) default_level: LogLevel,
}

thread_local! {
    static THREAD_NAME: String =
        std::thread::current().name().unwrap_or("unnamed").to_string();
}

/// A named handle into the ring. Cheap to clone; safe to use from any
/// thread when the service runs in multi-producer mode.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    id: u32,
    level: LogLevel,
}

impl Logger {
    pub(crate) fn new(shared: Arc<Shared>, id: u32) -> Self {
        let level = shared.default_level;
        Logger { shared, id, level }
    }

    /// Override the minimum level for this handle.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Claim the next slot, blocking (per the backpressure discipline)
    /// while the ring is full. No level filtering.
    pub fn start_record(&self, level: LogLevel) -> Result<RecordBuilder<'_>, ClaimError> {
        let seq = self.shared.ring.seq.claim(1)?;
        Ok(self.builder_for(seq, level))
    }

    /// Non-blocking claim: `WouldBlock` when the ring is full.
    pub fn try_start_record(&self, level: LogLevel) -> Result<RecordBuilder<'_>, ClaimError> {
        let seq = self.shared.ring.seq.try_claim(1)?;
        Ok(self.builder_for(seq, level))
    }

    /// Level-filtered acquisition. `None` silently drops the record:
    /// below this handle's level, or the service is shutting down.
    pub fn record(&self, level: LogLevel) -> Option<RecordBuilder<'_>> {
        if !self.enabled(level) {
            return None;
        }
        self.start_record(level).ok()
    }

    pub fn trace(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Trace)
    }

    pub fn debug(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Debug)
    }

    pub fn info(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Info)
    }

    pub fn warn(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Warn)
    }

    pub fn error(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Error)
    }

    pub fn fatal(&self) -> Option<RecordBuilder<'_>> {
        self.record(LogLevel::Fatal)
    }

    fn builder_for(&self, seq: i64, level: LogLevel) -> RecordBuilder<'_> {
        // SAFETY: `seq` was just claimed by this thread and not yet
        // published, so the slot is exclusively ours.
        let slot = unsafe { self.shared.ring.slot_mut(seq) };
        let now = self.shared.clock.now_millis();
        THREAD_NAME.with(|name| slot.reset(level, now, self.id, name));
        RecordBuilder {
            shared: &self.shared,
            slot,
            seq,
            published: false,
        }
    }
}

/// One in-flight record. Append into it, then `commit()`.
pub struct RecordBuilder<'a> {
    shared: &'a Shared,
    slot: &'a mut Slot,
    seq: i64,
    published: bool,
}

impl RecordBuilder<'_> {
    pub fn append_i64(&mut self, v: i64) -> &mut Self {
        self.slot.append_i64(v);
        self
    }

    pub fn append_i32(&mut self, v: i32) -> &mut Self {
        self.slot.append_i32(v);
        self
    }

    pub fn append_byte(&mut self, v: i8) -> &mut Self {
        self.slot.append_byte(v);
        self
    }

    pub fn append_char(&mut self, v: char) -> &mut Self {
        self.slot.append_char(v);
        self
    }

    pub fn append_f64(&mut self, v: f64) -> &mut Self {
        self.slot.append_f64(v);
        self
    }

    /// Exactly `digits` fractional digits, clamped to 16.
    pub fn append_f64_digits(&mut self, v: f64, digits: usize) -> &mut Self {
        self.slot.append_f64_digits(v, digits);
        self
    }

    pub fn append_bool(&mut self, v: bool) -> &mut Self {
        self.slot.append_bool(v);
        self
    }

    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.slot.append_str(s);
        self
    }

    /// Render `format_args!` output into the payload.
    pub fn append_args(&mut self, args: std::fmt::Arguments<'_>) -> &mut Self {
        self.slot.append_args(args);
        self
    }

    /// Attach a parsed template; subsequent `with_*` calls bind its
    /// placeholders in order.
    pub fn pattern(&mut self, pattern: &Arc<Pattern>) -> &mut Self {
        self.slot.set_pattern(pattern);
        self
    }

    pub fn with_i64(&mut self, v: i64) -> &mut Self {
        self.slot.with_i64(v);
        self
    }

    pub fn with_i32(&mut self, v: i32) -> &mut Self {
        self.slot.with_i32(v);
        self
    }

    pub fn with_f64(&mut self, v: f64) -> &mut Self {
        self.slot.with_f64(v);
        self
    }

    pub fn with_char(&mut self, v: char) -> &mut Self {
        self.slot.with_char(v);
        self
    }

    pub fn with_bool(&mut self, v: bool) -> &mut Self {
        self.slot.with_bool(v);
        self
    }

    pub fn with_str(&mut self, s: &str) -> &mut Self {
        self.slot.with_str(s);
        self
    }

    /// Publish the record. Template misuse is returned to the caller and
    /// the slot goes out as an error record describing it; either way the
    /// claimed sequence is published so the ring never stalls.
    pub fn commit(&mut self) -> Result<(), PatternError> {
        let result = self.slot.finish();
        self.publish();
        result
    }

    fn publish(&mut self) {
        if self.published {
            return;
        }
        self.published = true;
        self.shared.ring.seq.publish(self.seq, self.seq);
        self.shared.signal.signal_all_when_blocking();
    }
}

impl Drop for RecordBuilder<'_> {
    fn drop(&mut self) {
        if !self.published {
            let _ = self.slot.finish();
            self.publish();
        }
    }
}
