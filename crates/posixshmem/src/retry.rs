use std::time::Duration;

/// Configuration for attach retries with exponential backoff
///
/// Used when a consumer may start before the producer has created and
/// sized the segment. Default values:
/// - 20 attempts with 1ms base delay
/// - Exponential backoff capped at 100ms
/// - Total worst-case wait: ~1.3s
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attach attempts before returning the last error
    pub max_attempts: u32,
    /// Initial delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap (backoff won't exceed this)
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt using exponential backoff
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}
