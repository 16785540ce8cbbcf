//! Retry backoff strategies
//!
//! A backoff strategy maps a 1-indexed retry number to the time to wait
//! before the next connection attempt. Strategies are pure apart from the
//! optional jitter drawn by [`TruncatedExponential`].

use rand::Rng;
use std::time::Duration;

/// Strategy deciding how long to wait after a failed connection attempt
pub trait Backoff: Send + Sync {
    /// Delay to apply after failed attempt number `retry` (1-indexed)
    fn delay(&self, retry: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, retry: u32) -> Duration {
        self(retry)
    }
}

/// Truncated exponential backoff with uniform jitter
///
/// `min(2^retry + jitter, cap_ms)` milliseconds, where `jitter` is drawn
/// uniformly from `0..max_jitter_ms`. All arithmetic saturates, so very
/// large retry numbers simply sit at the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatedExponential {
    /// Upper bound for any single delay, in milliseconds
    pub cap_ms: u64,
    /// Exclusive upper bound for the random jitter, in milliseconds
    pub max_jitter_ms: u64,
}

pub const DEFAULT_CAP_MS: u64 = 64_000;
pub const DEFAULT_MAX_JITTER_MS: u64 = 1_000;

impl Default for TruncatedExponential {
    fn default() -> Self {
        Self {
            cap_ms: DEFAULT_CAP_MS,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
        }
    }
}

impl TruncatedExponential {
    /// Deterministic variant, mostly useful for tests and reproducible runs
    pub fn without_jitter() -> Self {
        Self {
            max_jitter_ms: 0,
            ..Self::default()
        }
    }

    /// Delay in milliseconds for a given retry and an explicit jitter value
    pub fn delay_ms(&self, retry: u32, jitter_ms: u64) -> u64 {
        let exponential = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        exponential.saturating_add(jitter_ms).min(self.cap_ms)
    }

    fn draw_jitter(&self) -> u64 {
        if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.max_jitter_ms)
        }
    }
}

impl Backoff for TruncatedExponential {
    fn delay(&self, retry: u32) -> Duration {
        Duration::from_millis(self.delay_ms(retry, self.draw_jitter()))
    }
}

/// Same delay after every attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant(pub Duration);

impl Backoff for Constant {
    fn delay(&self, _retry: u32) -> Duration {
        self.0
    }
}

/// Fixed schedule of delays, then a sustained delay once the schedule runs out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub steps_ms: Vec<u64>,
    pub sustained_ms: u64,
}

impl Pattern {
    pub fn delay_ms(&self, retry: u32) -> u64 {
        let index = retry.saturating_sub(1) as usize;
        self.steps_ms
            .get(index)
            .copied()
            .unwrap_or(self.sustained_ms)
    }

    /// Sum of delays slept across `retries` attempts (no sleep after the last)
    pub fn total_wait_ms(&self, retries: u32) -> u64 {
        (1..retries).map(|retry| self.delay_ms(retry)).sum()
    }
}

impl Backoff for Pattern {
    fn delay(&self, retry: u32) -> Duration {
        Duration::from_millis(self.delay_ms(retry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_retry_without_jitter_is_one_millisecond() {
        let backoff = TruncatedExponential::without_jitter();
        assert_eq!(backoff.delay(0).as_secs_f64(), 0.001);
    }

    #[test]
    fn test_cap_reached_at_sixteen_and_beyond() {
        let backoff = TruncatedExponential::default();
        assert_eq!(backoff.delay(16).as_secs_f64(), 64.0);
        assert_eq!(backoff.delay(17).as_secs_f64(), 64.0);
    }

    #[test]
    fn test_huge_retry_numbers_saturate() {
        let backoff = TruncatedExponential::default();
        assert_eq!(backoff.delay_ms(64, 999), DEFAULT_CAP_MS);
        assert_eq!(backoff.delay_ms(u32::MAX, 0), DEFAULT_CAP_MS);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let backoff = TruncatedExponential::without_jitter();
        assert_eq!(backoff.delay_ms(1, 0), 2);
        assert_eq!(backoff.delay_ms(2, 0), 4);
        assert_eq!(backoff.delay_ms(10, 0), 1024);
    }

    #[test]
    fn test_closure_backoff() {
        let backoff = |retry: u32| Duration::from_secs(retry as u64);
        assert_eq!(backoff.delay(3), Duration::from_secs(3));
    }

    #[test]
    fn test_constant_backoff() {
        let backoff = Constant(Duration::from_millis(250));
        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(100), Duration::from_millis(250));
    }

    #[test]
    fn test_pattern_backoff_sustains_after_schedule() {
        let pattern = Pattern {
            steps_ms: vec![25, 50, 100, 250],
            sustained_ms: 500,
        };

        assert_eq!(pattern.delay_ms(1), 25);
        assert_eq!(pattern.delay_ms(4), 250);
        assert_eq!(pattern.delay_ms(5), 500);
        assert_eq!(pattern.delay_ms(100), 500);
        // Retry 0 is treated like the first step
        assert_eq!(pattern.delay_ms(0), 25);
    }

    #[test]
    fn test_pattern_total_wait_skips_final_attempt() {
        let pattern = Pattern {
            steps_ms: vec![25, 50, 100, 250],
            sustained_ms: 250,
        };
        assert_eq!(pattern.total_wait_ms(4), 25 + 50 + 100);
        assert_eq!(pattern.total_wait_ms(1), 0);
        assert_eq!(pattern.total_wait_ms(0), 0);
    }

    proptest! {
        #[test]
        fn prop_truncated_exponential_is_bounded(retry in 0u32..256) {
            let backoff = TruncatedExponential::default();
            let delay = backoff.delay(retry);
            prop_assert!(delay <= Duration::from_millis(DEFAULT_CAP_MS));
            prop_assert!(delay >= Duration::from_millis(1));
        }

        #[test]
        fn prop_jitter_never_lowers_delay(retry in 0u32..20, jitter in 0u64..1000) {
            let backoff = TruncatedExponential::default();
            prop_assert!(backoff.delay_ms(retry, jitter) >= backoff.delay_ms(retry, 0));
        }
    }
}
