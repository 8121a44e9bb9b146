//! Claim/publish sequencing over a power-of-two slot array.
//!
//! Three monotonic cursors partition the ring: `consumer <= publish <=
//! claim`, and `claim - consumer <= size` at all times (the backpressure
//! gate). Sequence `s` addresses cell `s & (size - 1)`. All cursors start
//! at `-1`.
//!
//! In multi-producer mode the claim cursor advances by CAS and each cell
//! carries an availability marker holding the last sequence published into
//! it; the consumer walks the markers in order and only crosses contiguous
//! published cells, which hides claim-order gaps. The cursors are
//! cache-line padded so producers hammering `claim` do not invalidate the
//! consumer's line.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::config::ProducerMode;
use crate::error::ClaimError;

pub(crate) const INITIAL_CURSOR: i64 = -1;

pub(crate) struct Sequencer {
    size: i64,
    mask: i64,
    multi: bool,
    claim: CachePadded<AtomicI64>,
    publish: CachePadded<AtomicI64>,
    consumer: CachePadded<AtomicI64>,
    available: Box<[AtomicI64]>,
    halted: AtomicBool,
}

impl Sequencer {
    pub(crate) fn new(entries: usize, mode: ProducerMode) -> Self {
        debug_assert!(entries.is_power_of_two());
        let multi = mode == ProducerMode::Multi;
        let cells = if multi { entries } else { 0 };
        Sequencer {
            size: entries as i64,
            mask: entries as i64 - 1,
            multi,
            claim: CachePadded::new(AtomicI64::new(INITIAL_CURSOR)),
            publish: CachePadded::new(AtomicI64::new(INITIAL_CURSOR)),
            consumer: CachePadded::new(AtomicI64::new(INITIAL_CURSOR)),
            available: (0..cells).map(|_| AtomicI64::new(INITIAL_CURSOR)).collect(),
            halted: AtomicBool::new(false),
        }
    }

    pub(crate) fn index(&self, seq: i64) -> usize {
        (seq & self.mask) as usize
    }

    pub(crate) fn size(&self) -> i64 {
        self.size
    }

    /// Reserve the next `n` sequences for writing, spinning while the ring
    /// is full. Returns the highest reserved sequence.
    ///
    /// Single-producer mode trusts the caller's contract that only one
    /// thread ever claims; the cursor advance is a plain store.
    pub(crate) fn claim(&self, n: i64) -> Result<i64, ClaimError> {
        debug_assert!(n >= 1 && n <= self.size);
        if self.multi {
            let backoff = Backoff::new();
            loop {
                if self.is_halted() {
                    return Err(ClaimError::Shutdown);
                }
                let current = self.claim.load(Ordering::Relaxed);
                let next = current + n;
                if next - self.consumer.load(Ordering::Acquire) > self.size {
                    backoff.snooze();
                    continue;
                }
                if self
                    .claim
                    .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return Ok(next);
                }
                backoff.spin();
            }
        } else {
            if self.is_halted() {
                return Err(ClaimError::Shutdown);
            }
            let next = self.claim.load(Ordering::Relaxed) + n;
            let backoff = Backoff::new();
            while next - self.consumer.load(Ordering::Acquire) > self.size {
                if self.is_halted() {
                    return Err(ClaimError::Shutdown);
                }
                backoff.snooze();
            }
            self.claim.store(next, Ordering::Relaxed);
            Ok(next)
        }
    }

    /// Non-blocking claim: `WouldBlock` when the ring is full.
    pub(crate) fn try_claim(&self, n: i64) -> Result<i64, ClaimError> {
        debug_assert!(n >= 1 && n <= self.size);
        if self.multi {
            loop {
                if self.is_halted() {
                    return Err(ClaimError::Shutdown);
                }
                let current = self.claim.load(Ordering::Relaxed);
                let next = current + n;
                if next - self.consumer.load(Ordering::Acquire) > self.size {
                    return Err(ClaimError::WouldBlock);
                }
                if self
                    .claim
                    .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return Ok(next);
                }
                // CAS lost to another producer, not fullness; retry.
            }
        } else {
            if self.is_halted() {
                return Err(ClaimError::Shutdown);
            }
            let next = self.claim.load(Ordering::Relaxed) + n;
            if next - self.consumer.load(Ordering::Acquire) > self.size {
                return Err(ClaimError::WouldBlock);
            }
            self.claim.store(next, Ordering::Relaxed);
            Ok(next)
        }
    }

    /// Make `lo..=hi` visible to the consumer. The release store is what
    /// transfers slot ownership.
    pub(crate) fn publish(&self, lo: i64, hi: i64) {
        if self.multi {
            for seq in lo..=hi {
                self.available[self.index(seq)].store(seq, Ordering::Release);
            }
        } else {
            self.publish.store(hi, Ordering::Release);
        }
    }

    /// Highest sequence the consumer may read, scanning from `from`.
    ///
    /// Multi-producer mode walks availability markers across contiguous
    /// published cells and folds the frontier into the publish cursor.
    /// Consumer-side only.
    pub(crate) fn highest_published(&self, from: i64) -> i64 {
        if !self.multi {
            return self.publish.load(Ordering::Acquire);
        }
        let limit = self.claim.load(Ordering::Acquire);
        let mut seq = from;
        while seq <= limit && self.available[self.index(seq)].load(Ordering::Acquire) == seq {
            seq += 1;
        }
        let frontier = seq - 1;
        if frontier > self.publish.load(Ordering::Relaxed) {
            self.publish.store(frontier, Ordering::Release);
        }
        frontier
    }

    /// Hand `..=seq` back to producers after draining.
    pub(crate) fn release(&self, seq: i64) {
        self.consumer.store(seq, Ordering::Release);
    }

    pub(crate) fn claim_cursor(&self) -> i64 {
        self.claim.load(Ordering::Acquire)
    }

    pub(crate) fn publish_cursor(&self) -> i64 {
        self.publish.load(Ordering::Acquire)
    }

    pub(crate) fn consumer_cursor(&self) -> i64 {
        self.consumer.load(Ordering::Acquire)
    }

    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}
