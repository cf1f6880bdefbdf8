use std::time::Duration;

/// Linear backoff between attempts of the same command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Retry `i` (0-indexed) waits `backoff_base * (i + 1)`.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
    pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff_base * (retry + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BACKOFF_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waits_one_through_five_seconds() {
        let policy = RetryPolicy::default();

        let delays: Vec<u64> = (0..policy.retries())
            .map(|i| policy.delay_for_retry(i).as_secs())
            .collect();

        assert_eq!(delays, vec![1, 2, 3, 4, 5]);
        assert_eq!(delays.iter().sum::<u64>(), 15);
    }

    #[test]
    fn at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.retries(), 0);
    }
}
