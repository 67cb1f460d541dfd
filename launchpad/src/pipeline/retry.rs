//! Retry policy for retryable step outcomes.
//!
//! A stage that reports `Retryable` is re-invoked after a backoff delay until
//! the attempt bound is reached. Backoff sleeps end early when the run is
//! cancelled.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cancellation::CancellationToken;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * 2^(n-1)` before retry `n`.
    #[default]
    Exponential,
    /// `base` before every retry.
    Fixed,
}

/// Randomization applied to the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Use the delay as computed.
    None,
    /// Uniform in `0..=delay`.
    #[default]
    Full,
    /// `delay / 2` plus uniform in `0..=delay / 2`.
    Equal,
}

impl JitterStrategy {
    fn apply(self, delay_ms: u64) -> u64 {
        match self {
            Self::None => delay_ms,
            Self::Full if delay_ms > 0 => rand::thread_rng().gen_range(0..=delay_ms),
            Self::Equal if delay_ms > 1 => {
                let half = delay_ms / 2;
                half + rand::thread_rng().gen_range(0..=half)
            }
            Self::Full | Self::Equal => delay_ms,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Per-stage retry bound and backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum invocations per stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound of any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth of the delay.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Randomization of the delay.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            jitter_strategy: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// The default policy: three attempts, exponential from one second.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the attempt bound. Zero is treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Delay before retry number `retry` (1-based), before jitter.
    #[must_use]
    pub fn nominal_delay_ms(&self, retry: u32) -> u64 {
        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
                self.base_delay_ms.saturating_mul(factor)
            }
            BackoffStrategy::Fixed => self.base_delay_ms,
        };
        delay.min(self.max_delay_ms)
    }
}

/// Failed attempts of the stage currently executing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Failed attempts so far.
    pub failures: u32,
}

impl RetryState {
    /// State before the first attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The 1-based number of the next attempt.
    #[must_use]
    pub fn next_attempt(&self) -> u32 {
        self.failures + 1
    }
}

/// What to do after a retryable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay.
    Retry(Duration),
    /// The attempt bound is reached.
    GiveUp,
}

/// Records a failed attempt and decides whether to try again.
#[must_use]
pub fn should_retry(state: &mut RetryState, config: &RetryConfig) -> RetryDecision {
    state.failures += 1;
    if state.failures >= config.max_attempts.max(1) {
        return RetryDecision::GiveUp;
    }
    let delay = config.nominal_delay_ms(state.failures);
    RetryDecision::Retry(Duration::from_millis(config.jitter_strategy.apply(delay)))
}

/// Sleeps for `delay` unless `cancel` fires first. Returns false if cancelled.
pub async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    cancel.run_until_cancelled(tokio::time::sleep(delay)).await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_delay(decision: RetryDecision) -> Duration {
        match decision {
            RetryDecision::Retry(delay) => delay,
            RetryDecision::GiveUp => panic!("expected a retry"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(config.jitter_strategy, JitterStrategy::Full);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RetryConfig = serde_json::from_str(r#"{"max_attempts": 5, "jitter_strategy": "none"}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.jitter_strategy, JitterStrategy::None);
    }

    #[test]
    fn test_attempt_floor() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
        let mut state = RetryState::new();
        assert_eq!(should_retry(&mut state, &RetryConfig::no_retry()), RetryDecision::GiveUp);
    }

    #[test]
    fn test_gives_up_at_bound() {
        let config = RetryConfig::new().with_jitter(JitterStrategy::None);
        let mut state = RetryState::new();

        assert_eq!(state.next_attempt(), 1);
        assert_eq!(retry_delay(should_retry(&mut state, &config)), Duration::from_secs(1));
        assert_eq!(state.next_attempt(), 2);
        assert_eq!(retry_delay(should_retry(&mut state, &config)), Duration::from_secs(2));
        assert_eq!(should_retry(&mut state, &config), RetryDecision::GiveUp);
        assert_eq!(state.failures, 3);
    }

    #[test]
    fn test_nominal_delays() {
        let config = RetryConfig::new().with_base_delay_ms(100).with_max_delay_ms(1000);
        let delays: Vec<u64> = (1..=6).map(|n| config.nominal_delay_ms(n)).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(config.nominal_delay_ms(200), 1000);

        let fixed = config.with_backoff(BackoffStrategy::Fixed);
        assert_eq!(fixed.nominal_delay_ms(5), 100);
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..50 {
            assert!(JitterStrategy::Full.apply(100) <= 100);
            let equal = JitterStrategy::Equal.apply(100);
            assert!((50..=100).contains(&equal));
        }
        assert_eq!(JitterStrategy::Full.apply(0), 0);
        assert_eq!(JitterStrategy::Equal.apply(1), 1);
    }

    #[tokio::test]
    async fn test_backoff_interrupted_by_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel("stop");
        assert!(!backoff(Duration::from_secs(60), &cancel).await);
        assert!(backoff(Duration::from_millis(1), &CancellationToken::new()).await);
    }
}
