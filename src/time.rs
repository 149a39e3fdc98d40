//! Injectable time source
//!
//! The scheduler math (`schedule::planner`, `schedule::dispatcher`) is pure
//! and deterministic given a `now`; this module supplies that `now` through a
//! trait rather than calling `SystemTime::now()` inline, so tests can step
//! time without real sleeps. Grounded on `mofa-foundation`'s `Clock`/
//! `SystemClock` pair (enrichment: the teacher crate calls `SystemTime::now()`
//! directly throughout `gossip/state.rs` and `gossip/topology.rs`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. The crate's single internal time
/// representation — see DESIGN.md's Open Question #2.
pub type EpochSecs = u64;

/// A source of the current time, injectable for testing.
pub trait Clock: Send + Sync {
    /// Current time, in whole seconds since the Unix epoch.
    fn now_secs(&self) -> EpochSecs;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> EpochSecs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock whose value is set explicitly, for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    secs: AtomicU64,
}

impl FixedClock {
    /// Create a clock starting at `secs`.
    pub fn new(secs: EpochSecs) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    /// Advance the clock by `delta` seconds.
    pub fn advance(&self, delta: u64) {
        self.secs.fetch_add(delta, Ordering::SeqCst);
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, secs: EpochSecs) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> EpochSecs {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(1000);
        assert_eq!(clock.now_secs(), 1000);
        clock.advance(60);
        assert_eq!(clock.now_secs(), 1060);
    }

    #[test]
    fn system_clock_is_plausible() {
        let clock = SystemClock;
        // Some time after this spec was written.
        assert!(clock.now_secs() > 1_700_000_000);
    }
}
