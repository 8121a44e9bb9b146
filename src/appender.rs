//! The consumer-side pipeline: level filter, layout, reusable output
//! buffer, flush policy, sink-failure fallback.

use std::sync::Arc;

use crate::buffer::{Buf, ByteBuf};
use crate::error::ErrorHandler;
use crate::facade::Registry;
use crate::layout::Layout;
use crate::level::LogLevel;
use crate::sink::Sink;
use crate::slot::Slot;

/// Room reserved for one rendered header.
const HEADER_SLACK: usize = 256;

pub(crate) struct Appender {
    threshold: LogLevel,
    layout: Box<dyn Layout>,
    sink: Box<dyn Sink>,
    out: ByteBuf,
    immediate_flush: bool,
    flush_threshold: usize,
    slot_capacity: usize,
    registry: Arc<Registry>,
    errors: Arc<dyn ErrorHandler>,
}

impl Appender {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        threshold: LogLevel,
        layout: Box<dyn Layout>,
        sink: Box<dyn Sink>,
        immediate_flush: bool,
        flush_threshold: usize,
        slot_capacity: usize,
        registry: Arc<Registry>,
        errors: Arc<dyn ErrorHandler>,
    ) -> Self {
        Appender {
            threshold,
            layout,
            sink,
            out: ByteBuf::new(flush_threshold + slot_capacity + HEADER_SLACK),
            immediate_flush,
            flush_threshold,
            slot_capacity,
            registry,
            errors,
        }
    }

    pub(crate) fn process(&mut self, slot: &Slot) {
        if slot.level() < self.threshold {
            return;
        }
        // Make room up front so a record never splits across flushes.
        if self.out.remaining() < self.slot_capacity + HEADER_SLACK {
            self.flush();
        }
        let registry = Arc::clone(&self.registry);
        registry.with_name(slot.logger_id(), |name| {
            self.layout.format(slot, name, &mut self.out)
        });
        if self.immediate_flush || self.out.position() >= self.flush_threshold {
            self.flush();
        }
    }

    /// Called once per drained batch.
    pub(crate) fn end_of_batch(&mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        if self.out.position() == 0 {
            return;
        }
        let result = self
            .sink
            .write(self.out.as_bytes())
            .and_then(|_| self.sink.flush());
        if let Err(e) = result {
            self.errors.on_error("sink write failed", &e);
        }
        // Reset even on failure so partial content is never re-emitted.
        self.out.clear();
    }

    pub(crate) fn close(&mut self) {
        self.flush();
        if let Err(e) = self.sink.close() {
            self.errors.on_error("sink close failed", &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StderrHandler;
    use crate::layout::MessageLayout;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Sink for SharedSink {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "down"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    impl crate::error::ErrorHandler for CountingHandler {
        fn on_error(&self, _context: &str, _error: &io::Error) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn slot(level: LogLevel, message: &str) -> Slot {
        let mut slot = Slot::new(128, false);
        slot.reset(level, 0, 0, "main");
        slot.append_str(message);
        slot.finish().unwrap();
        slot
    }

    fn appender(sink: impl Sink, threshold: LogLevel, immediate: bool) -> Appender {
        Appender::new(
            threshold,
            Box::new(MessageLayout),
            Box::new(sink),
            immediate,
            4096,
            128,
            Arc::new(Registry::new()),
            Arc::new(StderrHandler),
        )
    }

    #[test]
    fn records_below_threshold_are_skipped() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut appender = appender(SharedSink(output.clone()), LogLevel::Warn, false);
        appender.process(&slot(LogLevel::Info, "quiet"));
        appender.process(&slot(LogLevel::Error, "loud"));
        appender.end_of_batch();
        assert_eq!(output.lock().unwrap().as_slice(), b"loud\n");
    }

    #[test]
    fn immediate_flush_writes_per_record() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut appender = appender(SharedSink(output.clone()), LogLevel::Trace, true);
        appender.process(&slot(LogLevel::Info, "one"));
        assert_eq!(output.lock().unwrap().as_slice(), b"one\n");
        appender.process(&slot(LogLevel::Info, "two"));
        assert_eq!(output.lock().unwrap().as_slice(), b"one\ntwo\n");
    }

    #[test]
    fn batched_output_waits_for_end_of_batch() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut appender = appender(SharedSink(output.clone()), LogLevel::Trace, false);
        appender.process(&slot(LogLevel::Info, "one"));
        appender.process(&slot(LogLevel::Info, "two"));
        assert!(output.lock().unwrap().is_empty());
        appender.end_of_batch();
        assert_eq!(output.lock().unwrap().as_slice(), b"one\ntwo\n");
    }

    #[test]
    fn sink_failure_reaches_the_fallback_and_does_not_stick() {
        let failures = Arc::new(AtomicUsize::new(0));
        let mut appender = Appender::new(
            LogLevel::Trace,
            Box::new(MessageLayout),
            Box::new(FailingSink),
            true,
            4096,
            128,
            Arc::new(Registry::new()),
            Arc::new(CountingHandler(failures.clone())),
        );
        appender.process(&slot(LogLevel::Info, "lost"));
        assert_eq!(failures.load(Ordering::Relaxed), 1);
        // The buffer was reset; the next record renders alone.
        appender.process(&slot(LogLevel::Info, "also lost"));
        assert_eq!(failures.load(Ordering::Relaxed), 2);
    }
}
