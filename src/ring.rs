//! The ring: slot array, sequencer, and the consumer pump.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::appender::Appender;
use crate::config::ProducerMode;
use crate::seq::Sequencer;
use crate::slot::Slot;
use crate::wait::Waiter;

pub(crate) struct Ring {
    slots: Box<[UnsafeCell<Slot>]>,
    pub(crate) seq: Sequencer,
}

// The slot array is partitioned by sequence: the claim/publish/release
// protocol guarantees no two threads address the same cell at the same
// time, and ownership transfers carry release/acquire edges.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    pub(crate) fn new(
        entries: usize,
        slot_capacity: usize,
        multibyte: bool,
        mode: ProducerMode,
    ) -> Ring {
        Ring {
            slots: (0..entries)
                .map(|_| UnsafeCell::new(Slot::new(slot_capacity, multibyte)))
                .collect(),
            seq: Sequencer::new(entries, mode),
        }
    }

    /// # Safety
    ///
    /// The caller must own `seq` under the sequencing protocol: a producer
    /// between claim and publish, or the consumer for published,
    /// unreleased sequences.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, seq: i64) -> &mut Slot {
        &mut *self.slots[self.seq.index(seq)].get()
    }
}

/// Owns the consumer thread's loop: wait, drain, release, repeat; on halt,
/// one final drain up to the published frontier.
pub(crate) struct Dispatcher {
    pub(crate) ring: Arc<Ring>,
    pub(crate) waiter: Waiter,
    pub(crate) appender: Appender,
    pub(crate) done: Arc<AtomicBool>,
}

impl Dispatcher {
    pub(crate) fn run(mut self) {
        let mut next = 0i64;
        loop {
            match self.waiter.wait_for(next, &self.ring.seq) {
                Ok(available) => {
                    for seq in next..=available {
                        let slot = unsafe { self.ring.slot_mut(seq) };
                        self.appender.process(slot);
                    }
                    self.appender.end_of_batch();
                    self.ring.seq.release(available);
                    next = available + 1;
                }
                Err(_) => break, // halted
            }
        }

        // Drain everything already published at the halt, then exit.
        let available = self.ring.seq.highest_published(next);
        for seq in next..=available {
            let slot = unsafe { self.ring.slot_mut(seq) };
            self.appender.process(slot);
        }
        self.appender.end_of_batch();
        if available >= next {
            self.ring.seq.release(available);
        }
        self.appender.close();
        self.done.store(true, Ordering::Release);
    }
}
