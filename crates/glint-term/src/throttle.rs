// SPDX-License-Identifier: MIT
//
// Leading + trailing throttle over an injected clock.
//
// The first request in a quiet period runs immediately and opens a window
// of `interval`. Requests inside the window collapse into one pending
// trailing run, due when the window closes; that run opens a new window.
// The latest state is therefore never lost, only delayed.
//
// The throttle owns no timer and no callback. Callers pass `Instant`s in
// and act on the booleans that come back; the event loop sleeps until
// `next_deadline()` and then calls `poll()`. This keeps the whole thing
// deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    window_end: Option<Instant>,
    pending: bool,
}

impl Throttle {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_end: None,
            pending: false,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Request a run at `now`.
    ///
    /// Returns `true` if the caller should run now. Otherwise a trailing
    /// run is scheduled for the end of the current window.
    pub fn call(&mut self, now: Instant) -> bool {
        if self.is_open(now) {
            self.pending = true;
            return false;
        }
        self.open(now);
        true
    }

    /// Whether the trailing run is due at `now`. Consumes it if so.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.pending || self.is_open(now) {
            return false;
        }
        self.pending = false;
        self.open(now);
        true
    }

    /// When the pending trailing run becomes due, if one is scheduled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pending { self.window_end } else { None }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Drop any pending run and close the window.
    pub fn cancel(&mut self) {
        self.pending = false;
        self.window_end = None;
    }

    fn is_open(&self, now: Instant) -> bool {
        self.window_end.is_some_and(|end| now < end)
    }

    fn open(&mut self, now: Instant) {
        self.window_end = Some(now + self.interval);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn first_call_runs_immediately() {
        let mut t = Throttle::new(32 * MS);
        assert!(t.call(Instant::now()));
        assert!(!t.is_pending());
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn calls_inside_window_collapse_into_one_trailing_run() {
        let start = Instant::now();
        let mut t = Throttle::new(32 * MS);
        assert!(t.call(start));
        assert!(!t.call(start + 5 * MS));
        assert!(!t.call(start + 10 * MS));
        assert_eq!(t.next_deadline(), Some(start + 32 * MS));

        assert!(!t.poll(start + 31 * MS));
        assert!(t.poll(start + 32 * MS));
        assert!(!t.poll(start + 33 * MS));
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn trailing_run_opens_new_window() {
        let start = Instant::now();
        let mut t = Throttle::new(10 * MS);
        t.call(start);
        t.call(start + MS);
        assert!(t.poll(start + 10 * MS));
        assert!(!t.call(start + 15 * MS));
        assert_eq!(t.next_deadline(), Some(start + 20 * MS));
    }

    #[test]
    fn call_after_window_runs_again() {
        let start = Instant::now();
        let mut t = Throttle::new(10 * MS);
        assert!(t.call(start));
        assert!(t.call(start + 10 * MS));
        assert!(!t.is_pending());
    }

    #[test]
    fn zero_interval_never_defers() {
        let now = Instant::now();
        let mut t = Throttle::new(Duration::ZERO);
        assert!(t.call(now));
        assert!(t.call(now));
        assert!(!t.poll(now));
    }

    #[test]
    fn poll_without_pending_is_false() {
        let now = Instant::now();
        let mut t = Throttle::new(10 * MS);
        assert!(!t.poll(now));
        t.call(now);
        assert!(!t.poll(now + 20 * MS));
    }

    #[test]
    fn cancel_drops_pending() {
        let start = Instant::now();
        let mut t = Throttle::new(10 * MS);
        t.call(start);
        t.call(start + MS);
        t.cancel();
        assert!(!t.poll(start + 20 * MS));
        assert!(t.call(start + 2 * MS));
    }
}
