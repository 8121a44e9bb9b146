//! Message templates: literal text with `%s` placeholders and `%%`
//! escapes, parsed once and shared across records.

use crate::buffer::Buf;
use crate::error::{Overflow, PatternError};

/// An immutable parsed template. Parse once at setup, hand out through an
/// `Arc`; binding values against it never allocates.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    raw: Box<str>,
    placeholders: usize,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Pattern, PatternError> {
        let bytes = raw.as_bytes();
        let mut placeholders = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                match bytes.get(i + 1) {
                    Some(b's') => {
                        placeholders += 1;
                        i += 2;
                    }
                    Some(b'%') => i += 2,
                    _ => return Err(PatternError::Malformed { at: i }),
                }
            } else {
                i += 1;
            }
        }
        Ok(Pattern {
            raw: raw.into(),
            placeholders,
        })
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Copy literal text starting at byte `from` into `buf`, translating
    /// `%%` to `%`. Stops just past a consumed `%s` (returns `(pos, true)`)
    /// or at the end of the template (`(len, false)`).
    pub(crate) fn emit_literal_run<B: Buf + ?Sized>(
        &self,
        from: usize,
        buf: &mut B,
    ) -> Result<(usize, bool), Overflow> {
        let bytes = self.raw.as_bytes();
        let mut i = from;
        let mut lit_start = from;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                buf.put_str(&self.raw[lit_start..i])?;
                // parse() guarantees a byte follows every '%'
                if bytes[i + 1] == b's' {
                    return Ok((i + 2, true));
                }
                buf.put_ascii(b'%')?;
                i += 2;
                lit_start = i;
            } else {
                i += 1;
            }
        }
        buf.put_str(&self.raw[lit_start..])?;
        Ok((bytes.len(), false))
    }
}
