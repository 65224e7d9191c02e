//! Deadline tracking for the receive loops.
//!
//! Both the reply wait and the part collector run two clocks:
//! - an **idle timeout** bounding each individual read (handled by the
//!   transport), and
//! - an **overall deadline** bounding the loop as a whole, tracked here.
//!
//! A loop that only had the idle timeout would spin forever on a stalled
//! transfer, since every idle read just triggers another iteration.

use std::time::{Duration, Instant};

/// A fixed point in time after which a loop must stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now with `budget` to spend.
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Time spent since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// True once strictly more than the budget has been spent.
    pub fn expired(&self) -> bool {
        self.elapsed() > self.budget
    }

    /// Budget left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// The idle timeout for the next read: never longer than what remains,
    /// so the loop does not overshoot the deadline by a whole idle period.
    pub fn next_wait(&self, idle: Duration) -> Duration {
        idle.min(self.remaining())
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_deadline_is_not_expired() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.expired());
        assert!(d.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let d = Deadline::after(Duration::ZERO);
        thread::sleep(Duration::from_millis(2));
        assert!(d.expired());
        assert_eq!(d.remaining(), Duration::ZERO);
    }

    #[test]
    fn next_wait_is_capped_by_remaining_budget() {
        let d = Deadline::after(Duration::from_millis(50));
        assert!(d.next_wait(Duration::from_secs(5)) <= Duration::from_millis(50));
        assert_eq!(
            Deadline::after(Duration::from_secs(60)).next_wait(Duration::from_millis(10)),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn elapsed_tracks_wall_clock() {
        let d = Deadline::after(Duration::from_secs(1));
        thread::sleep(Duration::from_millis(20));
        assert!(d.elapsed() >= Duration::from_millis(20));
        assert_eq!(d.budget(), Duration::from_secs(1));
    }
}
