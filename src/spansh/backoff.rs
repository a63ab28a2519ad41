//! Delays between polls of a queued job.
//!
//! Short jobs finish within a few seconds, long ones can take minutes,
//! so the delay starts short and grows by half each time until it
//! plateaus at the ceiling.

use std::time::Duration;

/// Production ceiling between polls.
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(30);

/// A non-decreasing, capped sequence of delays: `unit * ceil(1.5^n)`.
///
/// With a one second unit: 1, 2, 3, 4, 6, 8, 12, 18, 26, 30, 30, …
#[derive(Debug, Clone)]
pub struct Backoff {
    unit: Duration,
    ceiling: Duration,
    step: i32,
}

impl Backoff {
    pub fn new(unit: Duration, ceiling: Duration) -> Self {
        Self {
            unit,
            ceiling,
            step: 0,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), MAX_POLL_DELAY)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn next(&mut self) -> Option<Duration> {
        // The step stops growing at the ceiling, so the factor stays small.
        let factor = 1.5_f64.powi(self.step).ceil() as u32;
        let delay = self.unit.saturating_mul(factor).min(self.ceiling);
        if delay < self.ceiling {
            self.step += 1;
        }
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_schedule() {
        let secs: Vec<u64> = Backoff::default().take(12).map(|d| d.as_secs()).collect();
        assert_eq!(secs, [1, 2, 3, 4, 6, 8, 12, 18, 26, 30, 30, 30]);
    }

    #[test]
    fn non_decreasing_and_bounded() {
        let delays: Vec<Duration> = Backoff::default().take(200).collect();
        assert!(delays[0] < Duration::from_secs(5));
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(delays.iter().all(|d| *d <= MAX_POLL_DELAY));
    }

    #[test]
    fn scaled_unit() {
        let delays: Vec<Duration> = Backoff::new(Duration::from_millis(1), Duration::from_millis(5))
            .take(6)
            .collect();
        let millis: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(millis, [1, 2, 3, 4, 5, 5]);
    }
}
