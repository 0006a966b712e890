//! Monotonic time source for cooldowns and velocity sampling.
//!
//! Gesture timing is wall-clock based rather than tied to the render loop's
//! delta, so the classifier asks a `Clock` for "now" instead of accumulating
//! frame deltas.  `ManualClock` lets tests and the headless loop step time
//! deterministically.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Source of monotonic milliseconds.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.  Never decreases.
    fn now_ms(&self) -> u64;
}

// ── MonotonicClock ─────────────────────────────────────────

/// Real clock backed by `Instant`, origin at construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ── ManualClock ────────────────────────────────────────────

/// Clock advanced by hand.  Clones share the same counter, so one handle
/// can be given to the classifier while the caller keeps another to step it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Jump to an absolute time.  Going backwards is ignored.
    pub fn set(&self, ms: u64) {
        if ms >= self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
