//! Garbage-free, low-latency application logging.
//!
//! Application threads format primitives straight into preallocated ring
//! slots; one background consumer drains published slots, applies a
//! layout, and writes them to a sink. Emission is designed to stay in the
//! sub-microsecond range with zero steady-state allocation.
//!
//! # Architecture
//!
//! ```text
//! [Producer threads] → [RecordBuilder] → [Ring/Sequencer] → [Appender] → [Sink]
//!        ↓                   ↓                  ↓                ↓           ↓
//!    claim a slot       format into the   publish, wake     layout +    file or
//!    (lock-free)        slot's payload    the consumer      batched     console
//!                                         (wait strategy)   flushing
//! ```
//!
//! Slots, the ring, the sequencer, and the output buffer are allocated
//! once at startup; nothing on the logging path touches the heap. The
//! producer side suspends only when the ring is full, the consumer only
//! inside its wait strategy.
//!
//! # Usage
//!
//! ```rust, ignore
//! use gflog::{GflogBuilder, LogLevel};
//!
//! let service = GflogBuilder::new()
//!     .with_sink(gflog::sink::file("app.log")?)
//!     .with_log_level(LogLevel::Info)
//!     .build()?;
//!
//! let log = service.logger("core");
//! if let Some(mut record) = log.info() {
//!     record.append_str("connected in ").append_i64(elapsed_ms).append_str(" ms");
//!     let _ = record.commit();
//! }
//!
//! service.stop(std::time::Duration::from_secs(5));
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub mod bridge;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod facade;
pub mod fmt;
pub mod layout;
pub mod level;
pub mod pattern;
pub mod sink;
pub mod slot;
pub mod wait;

mod appender;
pub(crate) mod ring;
pub(crate) mod seq;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ProducerMode};
pub use error::{BuildError, ClaimError, ErrorHandler, Overflow, PatternError, StderrHandler};
pub use facade::{Logger, RecordBuilder};
pub use layout::{FullLayout, Layout, MessageLayout};
pub use level::LogLevel;
pub use pattern::Pattern;
pub use sink::{Sink, WriterSink};
pub use wait::WaitStrategy;

use appender::Appender;
use facade::{Registry, Shared};
use ring::{Dispatcher, Ring};
use wait::Waiter;

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Assembles a running [`LoggerService`].
pub struct GflogBuilder {
    config: Config,
    sink: Option<Box<dyn Sink>>,
    layout: Option<Box<dyn Layout>>,
    clock: Option<Arc<dyn Clock>>,
    errors: Option<Arc<dyn ErrorHandler>>,
}

impl Default for GflogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GflogBuilder {
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    pub fn from_config(config: Config) -> Self {
        GflogBuilder {
            config,
            sink: None,
            layout: None,
            clock: None,
            errors: None,
        }
    }

    pub fn with_writer<W>(self, writer: W) -> Self
    where
        W: io::Write + Send + 'static,
    {
        self.with_sink(WriterSink::new(writer))
    }

    pub fn with_sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_layout(mut self, layout: impl Layout) -> Self {
        self.layout = Some(Box::new(layout));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.errors = Some(Arc::new(handler));
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Ring slot count; must be a power of two.
    pub fn with_entries(mut self, entries: usize) -> Self {
        self.config.entries = entries;
        self
    }

    /// Total ring payload allocation, split evenly across the slots.
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    pub fn with_multibyte(mut self, multibyte: bool) -> Self {
        self.config.multibyte = multibyte;
        self
    }

    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.config.wait_strategy = strategy;
        self
    }

    pub fn with_producer_mode(mut self, mode: ProducerMode) -> Self {
        self.config.producer_mode = mode;
        self
    }

    pub fn with_immediate_flush(mut self, immediate: bool) -> Self {
        self.config.immediate_flush = immediate;
        self
    }

    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        self.config.await_timeout = timeout;
        self
    }

    /// Validate the configuration, allocate the ring, and start the
    /// consumer thread.
    pub fn build(self) -> Result<LoggerService, BuildError> {
        self.config.validate()?;
        let sink = self.sink.ok_or(BuildError::NoConfiguredSink)?;
        let layout: Box<dyn Layout> = match self.layout {
            Some(layout) => layout,
            None if self.config.pattern.trim() == "%m%n" => Box::new(MessageLayout),
            None => Box::new(FullLayout::new(self.config.time_zone)),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let errors = self.errors.unwrap_or_else(|| Arc::new(StderrHandler));

        let slot_capacity = self.config.slot_capacity();
        let registry = Arc::new(Registry::new());
        let ring = Arc::new(Ring::new(
            self.config.entries,
            slot_capacity,
            self.config.multibyte,
            self.config.producer_mode,
        ));
        let (waiter, signal) = Waiter::new(self.config.wait_strategy, self.config.await_timeout);
        let appender = Appender::new(
            self.config.log_level,
            layout,
            sink,
            self.config.immediate_flush,
            self.config.buffered_io_threshold,
            slot_capacity,
            Arc::clone(&registry),
            Arc::clone(&errors),
        );

        let done = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher {
            ring: Arc::clone(&ring),
            waiter,
            appender,
            done: Arc::clone(&done),
        };
        let handle = thread::Builder::new()
            .name("gflog-appender".to_string())
            .spawn(move || dispatcher.run())?;

        let shared = Arc::new(Shared {
            ring,
            signal,
            registry,
            clock,
            default_level: self.config.log_level,
        });
        Ok(LoggerService {
            shared,
            handle: Some(handle),
            done,
            errors,
        })
    }
}

/// A running logger service: the ring, its consumer thread, and the
/// logger registry. Dropping the service stops and drains it.
pub struct LoggerService {
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
    done: Arc<AtomicBool>,
    errors: Arc<dyn ErrorHandler>,
}

impl LoggerService {
    /// Hand out a named logger. Names are interned once; this is not a
    /// hot-path call.
    pub fn logger(&self, name: &str) -> Logger {
        Logger::new(Arc::clone(&self.shared), self.shared.registry.intern(name))
    }

    /// Highest sequence currently visible to the consumer.
    pub fn published_cursor(&self) -> i64 {
        self.shared.ring.seq.publish_cursor()
    }

    /// Halt producers, wait up to `timeout` for the consumer's final
    /// drain, and return the highest published sequence at shutdown. On
    /// expiry the unflushed tail is discarded and a warning goes to the
    /// fallback error handler.
    pub fn stop(mut self, timeout: Duration) -> i64 {
        self.shutdown(timeout);
        self.shared.ring.seq.publish_cursor()
    }

    fn shutdown(&mut self, timeout: Duration) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.ring.seq.halt();
        self.shared.signal.signal_all_when_blocking();
        let deadline = Instant::now() + timeout;
        while !self.done.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if self.done.load(Ordering::Acquire) {
            let _ = handle.join();
        } else {
            self.errors.on_error(
                "stop timeout expired, unflushed tail discarded",
                &io::Error::new(io::ErrorKind::TimedOut, "consumer still draining"),
            );
        }
    }
}

impl Drop for LoggerService {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_STOP_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn service_round_trip() {
        let out = SharedBuf::default();
        let service = GflogBuilder::new()
            .with_writer(out.clone())
            .with_log_level(LogLevel::Info)
            .with_entries(8)
            .with_buffer_size(8 * 256)
            .build()
            .unwrap();
        let log = service.logger("core");

        {
            let mut record = log.info().unwrap();
            record.append_str("x=").append_i64(42);
            record.commit().unwrap();
        }
        {
            let mut record = log.info().unwrap();
            record.append_f64(1.5).append_char(' ').append_bool(true);
            record.commit().unwrap();
        }
        assert!(log.debug().is_none(), "below the configured level");

        let published = service.stop(Duration::from_secs(5));
        assert_eq!(published, 1);
        assert_eq!(out.contents(), "x=42\n1.5 true\n");
    }

    #[test]
    fn full_layout_renders_with_injected_clock() {
        let out = SharedBuf::default();
        let service = GflogBuilder::new()
            .with_writer(out.clone())
            .with_layout(FullLayout::new(time::UtcOffset::UTC))
            .with_clock(ManualClock::new(1_614_834_367_890))
            .with_log_level(LogLevel::Info)
            .with_entries(8)
            .with_buffer_size(8 * 256)
            .build()
            .unwrap();
        let log = service.logger("db.pool");

        {
            let mut record = log.warn().unwrap();
            record.append_str("slow query");
            record.commit().unwrap();
        }
        service.stop(Duration::from_secs(5));

        let line = out.contents();
        assert!(line.starts_with("2021-03-04 05:06:07.890"), "{line}");
        assert!(line.contains(" WARN  ["), "{line}");
        assert!(line.contains("] db.pool - slow query\n"), "{line}");
    }

    #[test]
    fn dropped_builder_still_publishes() {
        let out = SharedBuf::default();
        let service = GflogBuilder::new()
            .with_writer(out.clone())
            .with_log_level(LogLevel::Info)
            .with_entries(8)
            .with_buffer_size(8 * 256)
            .build()
            .unwrap();
        let log = service.logger("core");

        {
            let mut record = log.info().unwrap();
            record.append_str("abandoned");
            // no commit
        }
        service.stop(Duration::from_secs(5));
        assert_eq!(out.contents(), "abandoned\n");
    }

    #[test]
    fn records_after_stop_are_silently_dropped() {
        let out = SharedBuf::default();
        let service = GflogBuilder::new()
            .with_writer(out.clone())
            .with_log_level(LogLevel::Info)
            .with_entries(8)
            .with_buffer_size(8 * 256)
            .build()
            .unwrap();
        let log = service.logger("core");
        service.stop(Duration::from_secs(5));

        assert!(log.info().is_none());
        assert_eq!(
            log.start_record(LogLevel::Info).err(),
            Some(ClaimError::Shutdown)
        );
    }

    #[test]
    fn single_producer_records_after_stop_are_silently_dropped() {
        let out = SharedBuf::default();
        let service = GflogBuilder::new()
            .with_writer(out.clone())
            .with_log_level(LogLevel::Info)
            .with_entries(8)
            .with_buffer_size(8 * 256)
            .with_producer_mode(ProducerMode::Single)
            .build()
            .unwrap();
        let log = service.logger("core");

        {
            let mut record = log.info().unwrap();
            record.append_str("before stop");
            record.commit().unwrap();
        }
        service.stop(Duration::from_secs(5));

        // The ring has plenty of room, but the halt flag alone must fail
        // the claim.
        assert!(log.info().is_none());
        assert_eq!(
            log.start_record(LogLevel::Info).err(),
            Some(ClaimError::Shutdown)
        );
        assert_eq!(
            log.try_start_record(LogLevel::Info).err(),
            Some(ClaimError::Shutdown)
        );
        assert_eq!(out.contents(), "before stop\n");
    }

    #[ignore]
    #[test]
    fn bench_gflog() {
        let service = GflogBuilder::new()
            .with_writer(io::stdout())
            .with_log_level(LogLevel::Info)
            .build()
            .unwrap();
        let log = service.logger("bench");

        let n = 1_000;
        let pause = Duration::from_millis(5);
        let mut total = 0u128;
        for i in 0..n {
            thread::sleep(pause);
            let now = Instant::now();
            if let Some(mut record) = log.info() {
                record
                    .append_str("logging through the ring! msg number: ")
                    .append_i64(i);
                let _ = record.commit();
            }
            total += now.elapsed().as_nanos();
        }

        println!(
            "gflog total producer-side time: {:?}",
            Duration::from_nanos(total as u64)
        );
    }

    #[ignore]
    #[test]
    fn bench_tracing() {
        use tracing::Level;
        use tracing_log::LogTracer;
        use tracing_subscriber::fmt;

        LogTracer::init().unwrap();
        let builder = tracing_appender::non_blocking::NonBlockingBuilder::default()
            .buffered_lines_limit(262_144);
        let (writer, _guard) = builder.finish(io::stdout());
        let subscriber = fmt::Subscriber::builder()
            .with_writer(writer)
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber).unwrap();

        let n = 1_000;
        let pause = Duration::from_millis(5);
        let mut total = 0u128;
        for i in 0..n {
            thread::sleep(pause);
            let now = Instant::now();
            log::info!("logging to tracing logger! msg number: {}", i);
            total += now.elapsed().as_nanos();
        }

        println!(
            "tracing total producer-side time: {:?}",
            Duration::from_nanos(total as u64)
        );
    }
}
