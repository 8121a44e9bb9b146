//! Primitive-to-decimal rendering straight into a caller-supplied buffer.
//!
//! Nothing here allocates: integers render through a stack scratch array,
//! doubles through fixed-point scaling against [`POW10`], and magnitudes
//! beyond `1e18` through an exact stack-resident big-integer expansion.
//! Capacity is checked before the first byte is written, so a failed append
//! leaves the buffer position untouched.
//!
//! Doubles keep the relaxed round-trip contract: re-parsing the output
//! lands within an absolute `1e-15` of the input below one, and within a
//! relative `1e-15` at or above one. Exponent notation is never produced.

use crate::buffer::Buf;
use crate::error::Overflow;

/// `10^k` for `k` in `0..=18`. Shared by digit counting and fractional
/// scaling; this table is the module's only shared state.
pub(crate) const POW10: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// Magnitudes at or above this render through the exact expansion path.
const LARGE: f64 = 1e18;

fn decimal_digits(v: u64) -> usize {
    let mut n = 1;
    while n < 19 && v >= POW10[n] as u64 {
        n += 1;
    }
    n
}

/// Number of characters [`append_i64`] writes for `v`, sign included.
/// Agrees with `v.to_string().len()` for every 64-bit value.
pub fn number_of_digits(v: i64) -> usize {
    (v < 0) as usize + decimal_digits(v.unsigned_abs())
}

fn put_u64<B: Buf + ?Sized>(buf: &mut B, v: u64) -> Result<(), Overflow> {
    let mut tmp = [0u8; 20];
    let mut i = tmp.len();
    let mut m = v;
    loop {
        i -= 1;
        tmp[i] = b'0' + (m % 10) as u8;
        m /= 10;
        if m == 0 {
            break;
        }
    }
    for &d in &tmp[i..] {
        buf.put_ascii(d)?;
    }
    Ok(())
}

fn put_u64_padded<B: Buf + ?Sized>(buf: &mut B, v: u64, width: usize) -> Result<(), Overflow> {
    for _ in decimal_digits(v)..width {
        buf.put_ascii(b'0')?;
    }
    put_u64(buf, v)
}

/// Shortest signed decimal of `v`. Handles `i64::MIN` (whose magnitude has
/// no two's-complement negation) via the unsigned magnitude.
pub fn append_i64<B: Buf + ?Sized>(buf: &mut B, v: i64) -> Result<(), Overflow> {
    let mag = v.unsigned_abs();
    buf.ensure((v < 0) as usize + decimal_digits(mag))?;
    if v < 0 {
        buf.put_ascii(b'-')?;
    }
    put_u64(buf, mag)
}

pub fn append_i32<B: Buf + ?Sized>(buf: &mut B, v: i32) -> Result<(), Overflow> {
    append_i64(buf, v as i64)
}

/// Signed decimal of a byte, `-128..=127`.
pub fn append_byte<B: Buf + ?Sized>(buf: &mut B, v: i8) -> Result<(), Overflow> {
    append_i64(buf, v as i64)
}

/// One character unit. In single-byte mode only `[0, 127]` is supported;
/// values above write their low byte (the caller's contract), which can
/// never spill past the unit.
pub fn append_char<B: Buf + ?Sized>(buf: &mut B, c: char) -> Result<(), Overflow> {
    buf.put_char(c)
}

pub fn append_f64<B: Buf + ?Sized>(buf: &mut B, v: f64) -> Result<(), Overflow> {
    if v.is_nan() {
        return buf.put_str("NaN");
    }
    if v.is_infinite() {
        return buf.put_str(if v.is_sign_positive() { "Infinity" } else { "-Infinity" });
    }
    let neg = v.is_sign_negative();
    let w = v.abs();
    if w >= LARGE {
        return append_exact_integral(buf, neg, w);
    }

    let mut int_part = w as u64;
    // Aim at 17 significant digits overall; a double holds fewer than 16.
    let frac_digits = 17usize.saturating_sub(decimal_digits(int_part)).clamp(1, 16);
    let scaled = (w - int_part as f64) * POW10[frac_digits] as f64;
    let mut frac = (scaled + 0.5) as u64;
    if frac >= POW10[frac_digits] as u64 {
        int_part += 1;
        frac = 0;
    }

    buf.ensure(neg as usize + decimal_digits(int_part) + 1 + frac_digits)?;
    if neg {
        buf.put_ascii(b'-')?;
    }
    put_u64(buf, int_part)?;
    buf.put_ascii(b'.')?;
    let first_frac = buf.position();
    put_u64_padded(buf, frac, frac_digits)?;

    // Drop trailing fraction zeros, keeping at least one digit.
    let mut end = buf.position();
    while end > first_frac + 1 && buf.as_bytes()[end - 1] == b'0' {
        end -= 1;
    }
    buf.truncate_to(end);
    Ok(())
}

/// Fixed-point rendering with exactly `digits` fractional digits, rounded
/// half-up. `digits` is clamped to 16; with `digits == 0` no decimal point
/// is written.
pub fn append_f64_digits<B: Buf + ?Sized>(
    buf: &mut B,
    v: f64,
    digits: usize,
) -> Result<(), Overflow> {
    if v.is_nan() {
        return buf.put_str("NaN");
    }
    if v.is_infinite() {
        return buf.put_str(if v.is_sign_positive() { "Infinity" } else { "-Infinity" });
    }
    let digits = digits.min(16);
    let neg = v.is_sign_negative();
    let w = v.abs();
    if w >= LARGE {
        // The fraction is identically zero at this magnitude; the exact
        // expansion keeps the re-parse lossless.
        return append_exact_integral(buf, neg, w);
    }

    let mut int_part = w as u64;
    let mut frac = ((w - int_part as f64) * POW10[digits] as f64 + 0.5) as u64;
    if frac >= POW10[digits] as u64 {
        int_part += 1;
        frac = 0;
    }

    let frac_width = if digits > 0 { 1 + digits } else { 0 };
    buf.ensure(neg as usize + decimal_digits(int_part) + frac_width)?;
    if neg {
        buf.put_ascii(b'-')?;
    }
    put_u64(buf, int_part)?;
    if digits > 0 {
        buf.put_ascii(b'.')?;
        put_u64_padded(buf, frac, digits)?;
    }
    Ok(())
}

/// Exact decimal expansion of a finite `w >= 1e18`, followed by `.0`.
///
/// Every double at this magnitude is an integer: `w = mantissa * 2^shift`.
/// The expansion runs over a fixed little-endian limb array (the widest
/// double needs ~1024 bits), extracting nine decimal digits per division,
/// so the re-parse returns the input bit-for-bit.
fn append_exact_integral<B: Buf + ?Sized>(buf: &mut B, neg: bool, w: f64) -> Result<(), Overflow> {
    let bits = w.to_bits();
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    let shift = (((bits >> 52) & 0x7ff) as i32) - 1075;
    debug_assert!(shift > 0);

    let mut limbs = [0u32; 40];
    limbs[0] = mantissa as u32;
    limbs[1] = (mantissa >> 32) as u32;
    let limb_shift = (shift / 32) as usize;
    let bit_shift = (shift % 32) as u32;
    for i in (0..2).rev() {
        let v = limbs[i];
        limbs[i] = 0;
        if bit_shift == 0 {
            limbs[i + limb_shift] |= v;
        } else {
            limbs[i + limb_shift] |= v << bit_shift;
            limbs[i + limb_shift + 1] |= v >> (32 - bit_shift);
        }
    }
    let mut len = (limb_shift + 3).min(limbs.len());
    while len > 1 && limbs[len - 1] == 0 {
        len -= 1;
    }

    // Nine-digit groups, least significant first.
    let mut groups = [0u32; 36];
    let mut ngroups = 0;
    while len > 0 {
        let mut rem: u64 = 0;
        for limb in limbs[..len].iter_mut().rev() {
            let cur = (rem << 32) | *limb as u64;
            *limb = (cur / 1_000_000_000) as u32;
            rem = cur % 1_000_000_000;
        }
        while len > 0 && limbs[len - 1] == 0 {
            len -= 1;
        }
        groups[ngroups] = rem as u32;
        ngroups += 1;
    }

    let width = neg as usize + decimal_digits(groups[ngroups - 1] as u64) + 9 * (ngroups - 1) + 2;
    buf.ensure(width)?;
    if neg {
        buf.put_ascii(b'-')?;
    }
    put_u64(buf, groups[ngroups - 1] as u64)?;
    for g in groups[..ngroups - 1].iter().rev() {
        put_u64_padded(buf, *g as u64, 9)?;
    }
    buf.put_str(".0")
}
