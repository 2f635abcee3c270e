//! Truncated exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

/// Delay policy between retries on the same model.
///
/// The wait before retry `n` (zero-indexed) is
/// `min(max_delay, base_delay * 2^n) + uniform(0, jitter)`, clamped to
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Width of the uniform jitter window added to each delay.
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(8000),
            jitter: Duration::from_millis(250),
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits. Useful for tests and one-shot tools.
    pub fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Deterministic component of the delay before retry `n`:
    /// `min(max_delay, base_delay * 2^n)`.
    pub fn exponential_delay(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before retry `n` with a caller-supplied jitter sample.
    ///
    /// The sample is capped at the policy's jitter window and the total is
    /// clamped to `max_delay`.
    pub fn delay_with_jitter(&self, retry: u32, jitter: Duration) -> Duration {
        (self.exponential_delay(retry) + jitter.min(self.jitter)).min(self.max_delay)
    }

    /// Delay before retry `n`, sampling jitter uniformly from
    /// `[0, jitter)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.delay_with_jitter(retry, self.sample_jitter())
    }

    fn sample_jitter(&self) -> Duration {
        let window = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if window == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_constants() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(300));
        assert_eq!(policy.max_delay, Duration::from_millis(8000));
        assert_eq!(policy.jitter, Duration::from_millis(250));
    }

    #[test]
    fn exponential_component_doubles_then_caps() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u128> = (0..7)
            .map(|n| policy.exponential_delay(n).as_millis())
            .collect();
        assert_eq!(delays, vec![300, 600, 1200, 2400, 4800, 8000, 8000]);
    }

    #[test]
    fn exponential_component_is_monotonic_and_never_overflows() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for n in 0..100 {
            let delay = policy.exponential_delay(n);
            assert!(delay >= previous, "retry {n}: {delay:?} < {previous:?}");
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
    }

    #[test]
    fn jitter_is_added_and_clamped() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_jitter(0, Duration::from_millis(100)),
            Duration::from_millis(400)
        );
        // Jitter samples above the window are capped to it.
        assert_eq!(
            policy.delay_with_jitter(0, Duration::from_secs(5)),
            Duration::from_millis(550)
        );
        // Near the cap the sum is clamped to max_delay.
        assert_eq!(
            policy.delay_with_jitter(5, Duration::from_millis(249)),
            Duration::from_millis(8000)
        );
    }

    #[test]
    fn sampled_delays_stay_in_bounds() {
        let policy = BackoffPolicy::default();
        for n in 0..10 {
            for _ in 0..50 {
                let delay = policy.delay_for(n);
                assert!(delay >= policy.exponential_delay(n));
                assert!(delay <= policy.max_delay + policy.jitter);
                assert!(delay <= policy.max_delay);
            }
        }
    }

    #[test]
    fn none_policy_never_waits() {
        let policy = BackoffPolicy::none();
        for n in 0..5 {
            assert_eq!(policy.delay_for(n), Duration::ZERO);
        }
    }
}
