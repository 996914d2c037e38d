use std::time::Duration;

/// Backoff policy shared by outbound delivery and socket reconnects
///
/// The delay for attempt `n` is `base_delay_ms * multiplier^n`, capped at
/// `max_delay_ms`, then spread by up to `jitter / 2` of itself either way.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first failure; socket reconnects ignore it
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fraction of the delay randomized, 0.0 disables jitter
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3, 100)
    }
}

impl RetryConfig {
    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Same delay before every attempt
    pub fn linear(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// 1s doubling up to 5s with heavy jitter, never giving up
    pub fn reconnect() -> Self {
        Self {
            max_attempts: u32::MAX,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: 0.5,
        }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let capped = (self.base_delay_ms as f64 * self.multiplier.powi(exponent)).min(self.max_delay_ms as f64);
        let spread = capped * self.jitter * (rand::random::<f64>() - 0.5);
        Duration::from_millis((capped + spread).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_is_capped() {
        let retry = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::exponential(5, 100)
        };
        assert_eq!(retry.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(retry.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(retry.calculate_delay(20), Duration::from_millis(5000));
    }

    #[test]
    fn test_linear_delay_is_constant() {
        let retry = RetryConfig::linear(3, 250);
        assert_eq!(retry.calculate_delay(0), retry.calculate_delay(2));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let retry = RetryConfig::reconnect();
        for attempt in 0..10 {
            let delay = retry.calculate_delay(attempt).as_millis() as u64;
            assert!(delay <= 5000 + 1250, "attempt {attempt}: {delay}ms");
        }
    }
}
