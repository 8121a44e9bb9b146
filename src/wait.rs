//! Wait strategies: how the consumer passes time while the ring is empty.
//!
//! The waiter lives on the consumer thread; publishers hold a cloneable
//! [`WaitSignal`] and poke it after every publish. Only the blocking
//! strategy actually parks, the rest burn progressively less CPU. Every
//! loop iteration observes the halt flag, so shutdown never waits for a
//! timeout.

use std::time::Duration;

use crossbeam_utils::sync::{Parker, Unparker};

use crate::error::ClaimError;
use crate::seq::Sequencer;

/// Consumer blocking discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Tight spin on the publish cursor. Lowest latency, wants a
    /// dedicated core.
    BusySpin,
    /// Spin a bounded number of iterations, then yield the scheduler.
    Yielding,
    /// Spin, then yield, then sleep in exponentially increasing
    /// intervals.
    Sleeping,
    /// Park until a publisher signals, re-checking every await timeout.
    #[default]
    Blocking,
}

impl WaitStrategy {
    /// Parse a strategy name from configuration.
    pub fn parse(s: &str) -> Option<WaitStrategy> {
        let strategy = match s.trim() {
            s if s.eq_ignore_ascii_case("busy-spin") => WaitStrategy::BusySpin,
            s if s.eq_ignore_ascii_case("yielding") => WaitStrategy::Yielding,
            s if s.eq_ignore_ascii_case("sleeping") => WaitStrategy::Sleeping,
            s if s.eq_ignore_ascii_case("blocking") => WaitStrategy::Blocking,
            _ => return None,
        };
        Some(strategy)
    }
}

const SPIN_TRIES: u32 = 128;
const YIELD_TRIES: u32 = 256;
const MAX_SLEEP: Duration = Duration::from_millis(1);

/// Consumer-side half: owns the parker and the spin state.
pub(crate) struct Waiter {
    strategy: WaitStrategy,
    parker: Parker,
    await_timeout: Duration,
}

/// Publisher-side half: signals a potentially parked consumer.
#[derive(Clone)]
pub(crate) struct WaitSignal {
    unparker: Unparker,
    blocking: bool,
}

impl WaitSignal {
    pub(crate) fn signal_all_when_blocking(&self) {
        if self.blocking {
            self.unparker.unpark();
        }
    }
}

impl Waiter {
    pub(crate) fn new(strategy: WaitStrategy, await_timeout: Duration) -> (Waiter, WaitSignal) {
        let parker = Parker::new();
        let signal = WaitSignal {
            unparker: parker.unparker().clone(),
            blocking: strategy == WaitStrategy::Blocking,
        };
        (
            Waiter {
                strategy,
                parker,
                await_timeout,
            },
            signal,
        )
    }

    /// Block until sequence `expected` is published, returning the highest
    /// published sequence (possibly further along). Fails with `Shutdown`
    /// once the halt flag is up.
    pub(crate) fn wait_for(&self, expected: i64, seq: &Sequencer) -> Result<i64, ClaimError> {
        let mut tries: u32 = 0;
        let mut sleep = Duration::from_micros(1);
        loop {
            let available = seq.highest_published(expected);
            if available >= expected {
                return Ok(available);
            }
            if seq.is_halted() {
                return Err(ClaimError::Shutdown);
            }
            match self.strategy {
                WaitStrategy::BusySpin => std::hint::spin_loop(),
                WaitStrategy::Yielding => {
                    if tries < SPIN_TRIES {
                        tries += 1;
                        std::hint::spin_loop();
                    } else {
                        std::thread::yield_now();
                    }
                }
                WaitStrategy::Sleeping => {
                    if tries < SPIN_TRIES {
                        tries += 1;
                        std::hint::spin_loop();
                    } else if tries < YIELD_TRIES {
                        tries += 1;
                        std::thread::yield_now();
                    } else {
                        std::thread::sleep(sleep);
                        sleep = (sleep * 2).min(MAX_SLEEP);
                    }
                }
                // The parker holds a token, so an unpark issued between
                // the cursor check and this call wakes us immediately.
                WaitStrategy::Blocking => self.parker.park_timeout(self.await_timeout),
            }
        }
    }
}
