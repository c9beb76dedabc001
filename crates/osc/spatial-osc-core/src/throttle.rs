//! Flush pacing and warning rate limiting.

use std::time::{Duration, Instant};

const GROWTH: f64 = 1.5;

/// Flush interval that backs off while the device is congested.
///
/// Grows by 1.5x (up to `max`) whenever in-flight messages reach half the cap
/// and decays back towards `base` once nothing is in flight.
#[derive(Clone, Debug)]
pub struct AdaptiveThrottle {
    base: Duration,
    max: Duration,
    current: Duration,
    adaptive: bool,
    last_flush: Option<Instant>,
}

impl AdaptiveThrottle {
    pub fn new(base: Duration, max: Duration, adaptive: bool) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            adaptive,
            last_flush: None,
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.current
    }

    /// True when the interval has elapsed since the last flush (or none happened yet).
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.current,
        }
    }

    pub fn mark_flushed(&mut self, now: Instant) {
        self.last_flush = Some(now);
    }

    pub fn observe(&mut self, in_flight: usize, cap: usize) {
        if !self.adaptive {
            return;
        }
        if cap > 0 && in_flight * 2 >= cap {
            self.current = self.current.mul_f64(GROWTH).min(self.max);
        } else if in_flight == 0 && self.current > self.base {
            self.current = self.current.div_f64(GROWTH).max(self.base);
        }
    }
}

/// Emits at most one warning per `period`, counting what it swallowed.
#[derive(Clone, Debug)]
pub struct RateLimitedWarning {
    period: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl RateLimitedWarning {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed_since_last)` when a warning should be logged now.
    pub fn check(&mut self, now: Instant) -> Option<u64> {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last = Some(now);
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }
}

impl Default for RateLimitedWarning {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_under_pressure_and_decays_when_drained() {
        let base = Duration::from_millis(33);
        let mut t = AdaptiveThrottle::new(base, Duration::from_millis(100), true);
        t.observe(60, 100);
        assert_eq!(t.interval(), base.mul_f64(1.5));
        for _ in 0..10 {
            t.observe(100, 100);
        }
        assert_eq!(t.interval(), Duration::from_millis(100));
        t.observe(10, 100);
        assert_eq!(t.interval(), Duration::from_millis(100));
        for _ in 0..10 {
            t.observe(0, 100);
        }
        assert_eq!(t.interval(), base);
    }

    #[test]
    fn fixed_interval_ignores_pressure() {
        let mut t = AdaptiveThrottle::new(
            Duration::from_millis(50),
            Duration::from_millis(200),
            false,
        );
        t.observe(100, 100);
        assert_eq!(t.interval(), Duration::from_millis(50));
    }

    #[test]
    fn due_after_interval() {
        let mut t = AdaptiveThrottle::new(
            Duration::from_millis(33),
            Duration::from_millis(100),
            true,
        );
        let start = Instant::now();
        assert!(t.is_due(start));
        t.mark_flushed(start);
        assert!(!t.is_due(start + Duration::from_millis(10)));
        assert!(t.is_due(start + Duration::from_millis(33)));
    }

    #[test]
    fn warning_is_rate_limited() {
        let mut w = RateLimitedWarning::default();
        let start = Instant::now();
        assert_eq!(w.check(start), Some(0));
        assert_eq!(w.check(start + Duration::from_secs(1)), None);
        assert_eq!(w.check(start + Duration::from_secs(4)), None);
        assert_eq!(w.check(start + Duration::from_secs(5)), Some(2));
    }
}
