//! Load-failure classification and bounded exponential backoff.

use hearth_abstraction::BackendError;
use serde::Deserialize;
use std::time::Duration;

/// What the scheduler should do about a backend load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Out-of-memory: a capacity signal. Evict once and retry, then treat
    /// as capacity exceeded.
    CapacitySignal,
    /// Transient backend trouble: retry with bounded backoff.
    RetryTransient,
    /// Registry/config mismatch: surface immediately, never retry.
    Fatal,
}

/// Classifies a backend error into a retry disposition.
#[must_use]
pub fn classify(error: &BackendError) -> FailureDisposition {
    match error {
        BackendError::OutOfMemory { .. } => FailureDisposition::CapacitySignal,
        BackendError::Unavailable(_) | BackendError::Other(_) => FailureDisposition::RetryTransient,
        BackendError::NotFound { .. } => FailureDisposition::Fatal,
    }
}

/// Bounded exponential-backoff policy for transient load failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total load attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    #[serde(rename = "initial_backoff_ms", with = "crate::config::millis")]
    pub initial_backoff: Duration,
    /// Growth factor between attempts.
    pub multiplier: f64,
    /// Upper bound on any single backoff.
    #[serde(rename = "max_backoff_ms", with = "crate::config::millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after the given zero-based failed attempt.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(16) as i32);
        let delay = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }

    /// Whether another attempt remains after `attempt` failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let oom = BackendError::OutOfMemory { model_id: "a".to_string() };
        assert_eq!(classify(&oom), FailureDisposition::CapacitySignal);

        let gone = BackendError::Unavailable("refused".to_string());
        assert_eq!(classify(&gone), FailureDisposition::RetryTransient);

        let missing = BackendError::NotFound { model_id: "a".to_string() };
        assert_eq!(classify(&missing), FailureDisposition::Fatal);
    }

    #[test]
    fn test_backoff_grows_and_saturates() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(500),
        };

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        // Capped thereafter.
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(500));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::default() };
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }
}
