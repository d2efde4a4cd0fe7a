//! Frame Clock
//!
//! Deadline scheduling for the tick thread. Each tick has a target start
//! time one period after the previous one, so sleep jitter does not
//! accumulate. A tick that starts more than a full period late resynchronises
//! the clock instead of replaying the missed ticks in a burst.

use std::time::{Duration, Instant};

use log::trace;

use crate::song::TvStandard;

/// Frame deadline tracker
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Active TV standard
    standard: TvStandard,
    /// Tick period
    period: Duration,
    /// Target start of the next tick
    deadline: Instant,
    /// Ticks completed
    frame_count: u64,
    /// Times the clock gave up on missed deadlines
    overruns: u64,
}

impl FrameClock {
    /// Start a clock whose first deadline is one period from now.
    pub fn new(standard: TvStandard) -> Self {
        Self::starting_at(standard, Instant::now())
    }

    /// Start a clock whose first deadline is one period after `start`.
    pub fn starting_at(standard: TvStandard, start: Instant) -> Self {
        let period = standard.frame_period();
        FrameClock {
            standard,
            period,
            deadline: start + period,
            frame_count: 0,
            overruns: 0,
        }
    }

    /// Switch the tick period; takes effect from the next deadline on.
    pub fn set_standard(&mut self, standard: TvStandard) {
        if standard != self.standard {
            self.standard = standard;
            self.period = standard.frame_period();
        }
    }

    /// Record a finished tick and return how long to sleep before the next.
    pub fn advance(&mut self) -> Option<Duration> {
        self.advance_at(Instant::now())
    }

    /// [`advance`](Self::advance) with an explicit current time.
    pub fn advance_at(&mut self, now: Instant) -> Option<Duration> {
        self.frame_count += 1;
        let deadline = self.deadline;
        if now < deadline {
            self.deadline = deadline + self.period;
            return Some(deadline - now);
        }
        let late = now - deadline;
        if late >= self.period {
            trace!("Tick {} late by {:?}, resynchronising", self.frame_count, late);
            self.overruns += 1;
            self.deadline = now + self.period;
        } else {
            self.deadline = deadline + self.period;
        }
        None
    }

    /// Current tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks completed.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of resynchronisations.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_waits_until_deadline() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(TvStandard::Pal, start);
        let wait = clock.advance_at(start + Duration::from_millis(5)).unwrap();
        assert_relative_eq!(wait.as_secs_f64(), 0.015, epsilon = 1e-9);
        // Second deadline is 40 ms after start
        let wait = clock.advance_at(start + Duration::from_millis(21)).unwrap();
        assert_relative_eq!(wait.as_secs_f64(), 0.019, epsilon = 1e-9);
    }

    #[test]
    fn test_small_lateness_catches_up() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(TvStandard::Pal, start);
        assert!(clock.advance_at(start + Duration::from_millis(30)).is_none());
        // The 40 ms deadline still stands
        let wait = clock.advance_at(start + Duration::from_millis(35)).unwrap();
        assert_relative_eq!(wait.as_secs_f64(), 0.005, epsilon = 1e-9);
        assert_eq!(clock.overruns(), 0);
    }

    #[test]
    fn test_overrun_resynchronises() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(TvStandard::Pal, start);
        let now = start + Duration::from_millis(100);
        assert!(clock.advance_at(now).is_none());
        assert_eq!(clock.overruns(), 1);
        let wait = clock.advance_at(now + Duration::from_millis(2)).unwrap();
        assert_relative_eq!(wait.as_secs_f64(), 0.018, epsilon = 1e-9);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn test_period_follows_standard() {
        let mut clock = FrameClock::new(TvStandard::Pal);
        assert_eq!(clock.period(), Duration::from_millis(20));
        clock.set_standard(TvStandard::Ntsc);
        assert_eq!(clock.period(), Duration::from_millis(16));
    }
}
