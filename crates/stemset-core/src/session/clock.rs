//! PositionClock - display-only position sampling
//!
//! One owned, cancellable repeating tick. Armed exactly while at least one
//! track is playing, disarmed otherwise; never consulted for alignment
//! decisions. The session drives it cooperatively from `poll`, so there is
//! no self-rescheduling task to leak.

use std::time::{Duration, Instant};

use crate::types::{Seconds, NUM_STEMS};

/// Default sampling interval for displayed positions
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Positions of all tracks as sampled on one clock tick
///
/// `None` for keys with no registered track. Samples are taken track by
/// track within a tick, so they are eventually consistent across tracks but
/// carry no cross-track atomicity guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSnapshot {
    pub positions: [Option<Seconds>; NUM_STEMS],
}

pub(crate) struct PositionClock {
    interval: Duration,
    /// Next sampling deadline; `None` while disarmed
    next_tick: Option<Instant>,
}

impl PositionClock {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Arm the clock; the first tick is due immediately
    pub(crate) fn arm(&mut self, now: Instant) {
        if self.next_tick.is_none() {
            self.next_tick = Some(now);
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.next_tick = None;
    }

    /// Whether a sampling tick is due at `now`; advances the deadline if so
    pub(crate) fn tick_due(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(due) if now >= due => {
                self.next_tick = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}
