//! Layouts: render a slot into the appender's output buffer.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::buffer::{BufWriter, ByteBuf};
use crate::slot::Slot;

/// Renders one record. Implementations must not allocate on the steady
/// path; everything goes through the reusable output buffer.
pub trait Layout: Send + 'static {
    fn format(&self, slot: &Slot, logger_name: &str, out: &mut ByteBuf);
}

/// `2024-01-15 14:30:45.123`
const TIMESTAMP_FMT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

/// Message-only rendering (`%m%n`): the payload and a newline.
pub struct MessageLayout;

impl Layout for MessageLayout {
    fn format(&self, slot: &Slot, _logger_name: &str, out: &mut ByteBuf) {
        out.put_bytes_lossy(slot.payload_bytes());
        out.put_bytes_lossy(b"\n");
    }
}

/// Full header rendering:
/// `2024-01-15 14:30:45.123 INFO  [main] db.pool - message\n`
pub struct FullLayout {
    offset: UtcOffset,
}

impl FullLayout {
    pub fn new(offset: UtcOffset) -> Self {
        FullLayout { offset }
    }
}

impl Layout for FullLayout {
    fn format(&self, slot: &Slot, logger_name: &str, out: &mut ByteBuf) {
        let ts = OffsetDateTime::from_unix_timestamp_nanos(slot.timestamp_millis() as i128 * 1_000_000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            .to_offset(self.offset);
        let mut w = BufWriter::new(out);
        let _ = ts.format_into(&mut w, TIMESTAMP_FMT);

        out.put_bytes_lossy(b" ");
        let level = slot.level().as_str();
        out.put_bytes_lossy(level.as_bytes());
        for _ in level.len()..5 {
            out.put_bytes_lossy(b" ");
        }
        out.put_bytes_lossy(b" [");
        out.put_bytes_lossy(slot.thread_name().as_bytes());
        out.put_bytes_lossy(b"] ");
        out.put_bytes_lossy(logger_name.as_bytes());
        out.put_bytes_lossy(b" - ");
        out.put_bytes_lossy(slot.payload_bytes());
        out.put_bytes_lossy(b"\n");
    }
}
