//! Retry backoff policies.

use std::time::Duration;

/// Default initial delay for exponential backoff.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Default ceiling for exponential backoff.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 60;

/// Delay policy applied between failed attempts of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    Fixed(Duration),

    /// Delay doubles (by `multiplier`) per attempt, capped at `max`.
    Exponential {
        initial: Duration,
        multiplier: u32,
        max: Duration,
    },
}

impl BackoffPolicy {
    /// Returns the delay to wait before the given retry.
    ///
    /// `attempt` is the number of attempts already made (1 after the first
    /// failure).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let factor = multiplier.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(*max)
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let policy = BackoffPolicy::Fixed(Duration::from_millis(250));
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(7), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = BackoffPolicy::Exponential {
            initial: Duration::from_millis(100),
            multiplier: 2,
            max: Duration::from_secs(10),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_exponential_delay_capped() {
        let policy = BackoffPolicy::Exponential {
            initial: Duration::from_secs(1),
            multiplier: 10,
            max: Duration::from_secs(5),
        };
        assert_eq!(policy.delay(4), Duration::from_secs(5));
    }

    #[test]
    fn test_default_is_exponential() {
        match BackoffPolicy::default() {
            BackoffPolicy::Exponential {
                initial,
                multiplier,
                max,
            } => {
                assert_eq!(initial, Duration::from_millis(DEFAULT_INITIAL_DELAY_MS));
                assert_eq!(multiplier, DEFAULT_BACKOFF_MULTIPLIER);
                assert_eq!(max, Duration::from_secs(DEFAULT_MAX_DELAY_SECS));
            }
            other => panic!("unexpected policy: {:?}", other),
        }
    }
}
