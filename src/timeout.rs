//! Deadlines measured against a pluggable millisecond clock.
//!
//! Waits follow the datagram transport contract: a wait of `0` means "block
//! until data arrives". Functions that constrain a wait return `None` once
//! the deadline has passed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of "now" in milliseconds. Only differences between readings are
/// meaningful.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-independent clock backed by [`Instant`].
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonotonicClock").finish()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the reading, also allowing it to go backwards.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// A deadline `duration_millis` after `start_millis`.
///
/// If the clock is observed to go backwards the timeout restarts from the
/// new reading. Once expired it stays expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    duration_millis: u64,
    start_millis: u64,
}

impl Timeout {
    pub fn new(duration_millis: u64, now: u64) -> Self {
        Self {
            duration_millis,
            start_millis: now,
        }
    }

    /// Deadline for a transport-style wait. `0` waits forever, which is no
    /// deadline at all.
    pub fn for_wait_millis(wait_millis: u32, now: u64) -> Option<Timeout> {
        (wait_millis > 0).then(|| Timeout::new(wait_millis as u64, now))
    }

    pub fn remaining_millis(&mut self, now: u64) -> u64 {
        if self.start_millis > now {
            self.start_millis = now;
            return self.duration_millis;
        }

        let elapsed = now - self.start_millis;
        if elapsed >= self.duration_millis {
            self.duration_millis = 0;
            return 0;
        }

        self.duration_millis - elapsed
    }

    /// `None` never expires.
    pub fn has_expired(timeout: Option<&mut Timeout>, now: u64) -> bool {
        timeout.is_some_and(|t| t.remaining_millis(now) < 1)
    }

    /// Wait allowed by `timeout`: `Some(0)` without a deadline, `None` when it
    /// has expired.
    pub fn wait_millis(timeout: Option<&mut Timeout>, now: u64) -> Option<u32> {
        let Some(timeout) = timeout else {
            return Some(0);
        };

        match timeout.remaining_millis(now) {
            0 => None,
            remaining => Some(remaining.min(u32::MAX as u64) as u32),
        }
    }

    /// Narrow `wait` so it does not outlast `timeout`.
    pub fn constrain_wait_millis(
        wait: Option<u32>,
        timeout: Option<&mut Timeout>,
        now: u64,
    ) -> Option<u32> {
        let wait = wait?;
        let timeout_millis = Self::wait_millis(timeout, now)?;

        Some(match (wait, timeout_millis) {
            (0, t) => t,
            (w, 0) => w,
            (w, t) => w.min(t),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_wait_is_no_deadline() {
        assert!(Timeout::for_wait_millis(0, 100).is_none());
        assert_eq!(Timeout::wait_millis(None, 100), Some(0));
        assert!(!Timeout::has_expired(None, u64::MAX));
    }

    #[test]
    fn counts_down_and_stays_expired() {
        let mut t = Timeout::new(100, 1000);
        assert_eq!(t.remaining_millis(1000), 100);
        assert_eq!(t.remaining_millis(1040), 60);
        assert_eq!(t.remaining_millis(1100), 0);
        assert!(Timeout::has_expired(Some(&mut t), 1100));

        // Going backwards after expiry does not revive it.
        assert_eq!(t.remaining_millis(500), 0);
        assert!(Timeout::has_expired(Some(&mut t), 600));
    }

    #[test]
    fn clock_going_backwards_restarts() {
        let mut t = Timeout::new(100, 1000);
        assert_eq!(t.remaining_millis(1050), 50);
        assert_eq!(t.remaining_millis(900), 100);
        assert_eq!(t.remaining_millis(950), 50);
    }

    #[test]
    fn constrain() {
        let now = 0;
        let mut t = Timeout::new(300, now);

        assert_eq!(Timeout::constrain_wait_millis(Some(0), Some(&mut t), now), Some(300));
        assert_eq!(Timeout::constrain_wait_millis(Some(100), Some(&mut t), now), Some(100));
        assert_eq!(Timeout::constrain_wait_millis(Some(500), Some(&mut t), now), Some(300));
        assert_eq!(Timeout::constrain_wait_millis(Some(500), None, now), Some(500));
        assert_eq!(Timeout::constrain_wait_millis(None, None, now), None);
        assert_eq!(Timeout::constrain_wait_millis(Some(10), Some(&mut t), 300), None);
    }

    #[test]
    fn manual_clock() {
        let clock = ManualClock::new(5);
        clock.advance(10);
        assert_eq!(clock.now_millis(), 15);
        clock.set(1);
        assert_eq!(clock.now_millis(), 1);
    }
}
