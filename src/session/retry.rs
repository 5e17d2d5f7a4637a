//! Contention Backoff
//!
//! Jittered exponential schedule for resubmitting a ledger call that lost a
//! nonce or footprint race.

use std::time::Duration;

use crate::core::rng::jitter_permille;

/// Retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl Backoff {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base, cap }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// May another attempt follow attempt number `attempt` (1-based)?
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Un-jittered delay after attempt `attempt`: `base · 2^(attempt-1)`, capped.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << exp).min(self.cap)
    }

    /// Delay after attempt `attempt`, scaled by `permille / 1000`.
    pub fn delay_with(&self, attempt: u32, permille: u64) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        Duration::from_millis(ceiling * permille.min(1000) / 1000)
    }

    /// Jittered delay after attempt `attempt`, between half and all of the ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, jitter_permille())
    }

    /// Sleep for [`Backoff::delay`].
    pub async fn sleep(&self, attempt: u32) {
        tokio::time::sleep(self.delay(attempt)).await;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(250), Duration::from_secs(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_ceiling_is_capped() {
        let b = Backoff::new(8, Duration::from_millis(100), Duration::from_millis(700));
        assert_eq!(b.ceiling(1), Duration::from_millis(100));
        assert_eq!(b.ceiling(2), Duration::from_millis(200));
        assert_eq!(b.ceiling(3), Duration::from_millis(400));
        assert_eq!(b.ceiling(4), Duration::from_millis(700));
        assert_eq!(b.ceiling(40), Duration::from_millis(700));
    }

    #[test]
    fn test_jitter_bounds() {
        let b = Backoff::default();
        assert_eq!(b.delay_with(2, 500), Duration::from_millis(250));
        assert_eq!(b.delay_with(2, 1000), Duration::from_millis(500));
        for _ in 0..50 {
            let d = b.delay(3);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1000), "{d:?}");
        }
    }

    #[test]
    fn test_attempt_budget() {
        let b = Backoff::default();
        assert_eq!(b.max_attempts(), 4);
        assert!(b.allows_retry_after(3));
        assert!(!b.allows_retry_after(4));
        assert_eq!(Backoff::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }
}
