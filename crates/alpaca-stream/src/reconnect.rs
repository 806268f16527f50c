//! Reconnection Policy
//!
//! Bounded exponential backoff with jitter for the stream supervisors.
//! `delay = min(base * 2^(attempts-1), max_delay) * jitter` with
//! `jitter ~ U(0.5, 1.5)`. An attempt limit of zero means retry forever.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Exponential backoff reconnection policy.
///
/// Tracks consecutive failed connection attempts for one stream. The counter
/// resets exactly when a connection reaches the authenticated state, so a
/// long-lived session that later drops starts again from the base delay.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectPolicy {
    /// Create a policy. `max_attempts == 0` retries without bound.
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Consecutive failed attempts so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the attempt budget is exhausted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.max_attempts != 0 && self.attempts >= self.max_attempts
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` when the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            warn!(
                attempts = self.attempts,
                max_attempts = self.max_attempts,
                "reconnect attempts exhausted"
            );
            return None;
        }

        self.attempts += 1;
        let delay = self.delay_for_attempt(self.attempts, rand::rng().random_range(0.5..=1.5));
        debug!(
            attempt = self.attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );
        Some(delay)
    }

    /// Reset the counter. Called on the transition into the connected state.
    pub fn reset(&mut self) {
        if self.attempts > 0 {
            debug!(attempts = self.attempts, "reconnect counter reset");
        }
        self.attempts = 0;
    }

    /// Delay for the nth attempt (1-based) with an explicit jitter factor.
    ///
    /// The exponential term is capped at `max_delay` before the jitter is
    /// applied, so the effective ceiling is `max_delay * 1.5`.
    fn delay_for_attempt(&self, attempt: u32, jitter: f64) -> Duration {
        let shift = attempt.saturating_sub(1).min(63);
        let exponential = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << shift)
            .min(self.max_delay.as_millis());
        // Millisecond magnitudes here are far below f64's integer precision.
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jittered = (exponential as f64 * jitter) as u64;
        Duration::from_millis(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_ms: u64, max_secs: u64, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_secs(max_secs),
            max_attempts,
        )
    }

    #[test]
    fn delays_double_without_jitter() {
        let p = policy(500, 30, 0);
        assert_eq!(p.delay_for_attempt(1, 1.0), Duration::from_millis(500));
        assert_eq!(p.delay_for_attempt(2, 1.0), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(3, 1.0), Duration::from_millis(2000));
        assert_eq!(p.delay_for_attempt(7, 1.0), Duration::from_millis(32_000));
        // Capped at max_delay from the 8th attempt on.
        assert_eq!(p.delay_for_attempt(8, 1.0), Duration::from_secs(30));
        assert_eq!(p.delay_for_attempt(40, 1.0), Duration::from_secs(30));
    }

    #[test]
    fn jitter_applies_after_cap() {
        let p = policy(500, 30, 0);
        assert_eq!(p.delay_for_attempt(20, 1.5), Duration::from_millis(45_000));
        assert_eq!(p.delay_for_attempt(20, 0.5), Duration::from_millis(15_000));
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        let p = policy(500, 30, 0);
        assert_eq!(p.delay_for_attempt(u32::MAX, 1.0), Duration::from_secs(30));
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut p = policy(1, 1, 3);
        assert!(p.next_delay().is_some());
        assert!(p.next_delay().is_some());
        assert!(p.next_delay().is_some());
        assert!(p.is_exhausted());
        assert!(p.next_delay().is_none());
        assert_eq!(p.attempts(), 3);
    }

    #[test]
    fn zero_max_attempts_never_exhausts() {
        let mut p = policy(1, 1, 0);
        for _ in 0..100 {
            assert!(p.next_delay().is_some());
        }
        assert!(!p.is_exhausted());
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut p = policy(500, 30, 3);
        let _ = p.next_delay();
        let _ = p.next_delay();
        assert_eq!(p.attempts(), 2);

        p.reset();
        assert_eq!(p.attempts(), 0);
        assert!(!p.is_exhausted());
        // First post-reset delay is back in the base-delay band.
        let delay = p.next_delay().unwrap();
        assert!(delay >= Duration::from_millis(250));
        assert!(delay <= Duration::from_millis(750));
    }

    proptest! {
        /// delay(n) always lands in [base * 2^(n-1) * 0.5, base * 2^(n-1) * 1.5],
        /// with the exponential term capped at max_delay.
        #[test]
        fn delay_stays_within_jitter_bounds(
            base_ms in 1u64..=2_000,
            max_secs in 1u64..=120,
            attempt in 1u32..=64,
        ) {
            let mut p = policy(base_ms, max_secs, 0);
            // Advance the counter to the requested attempt.
            for _ in 0..attempt {
                prop_assert!(p.next_delay().is_some());
            }
            prop_assert_eq!(p.attempts(), attempt);

            let shift = attempt.saturating_sub(1).min(63);
            let expected = (u128::from(base_ms) << shift).min(u128::from(max_secs) * 1_000);
            let lower = expected / 2;
            let upper = expected + expected / 2;

            let delay = u128::from(p.delay_for_attempt(attempt, 0.5).as_millis() as u64);
            prop_assert!(delay >= lower.saturating_sub(1));
            let delay = u128::from(p.delay_for_attempt(attempt, 1.5).as_millis() as u64);
            prop_assert!(delay <= upper + 1);
        }

        /// Randomly jittered delays from next_delay() observe the same bounds.
        #[test]
        fn sampled_delays_stay_within_bounds(
            base_ms in 1u64..=2_000,
            attempt in 1u32..=20,
        ) {
            let mut p = policy(base_ms, 3_600, 0);
            let mut last = Duration::ZERO;
            for _ in 0..attempt {
                last = p.next_delay().unwrap();
            }
            let expected = (u128::from(base_ms) << (attempt - 1)).min(3_600_000);
            prop_assert!(u128::from(last.as_millis() as u64) >= expected / 2 - (expected / 2).min(1));
            prop_assert!(u128::from(last.as_millis() as u64) <= expected + expected / 2 + 1);
        }
    }
}
