//! Sinks: terminal byte streams for rendered records.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Where formatted bytes end up. All three operations may fail; the
/// pipeline routes failures to the fallback error handler and keeps
/// going.
pub trait Sink: Send + 'static {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Adapter over any `io::Write`.
pub struct WriterSink<W>(W);

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink(writer)
    }
}

impl<W: Write + Send + 'static> Sink for WriterSink<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Append-mode file sink, created along with any missing parent file.
pub fn file(path: impl AsRef<Path>) -> io::Result<WriterSink<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(WriterSink::new(file))
}

pub fn console() -> WriterSink<io::Stdout> {
    WriterSink::new(io::stdout())
}
