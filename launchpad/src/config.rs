//! Engine configuration.
//!
//! Values come from code (`with_*` builders), a JSON document, or
//! `LAUNCHPAD_*` environment variables layered over either.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::pipeline::RetryConfig;
use crate::progress::ChannelConfig;

fn default_replay_buffer_size() -> usize {
    256
}

fn default_subscriber_queue_size() -> usize {
    64
}

fn default_close_grace_period_ms() -> u64 {
    30_000
}

/// Tunables of the pipeline engine and its progress channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Events each run retains for late subscribers.
    #[serde(default = "default_replay_buffer_size")]
    pub replay_buffer_size: usize,
    /// Live queue capacity per subscriber before it is disconnected.
    #[serde(default = "default_subscriber_queue_size")]
    pub subscriber_queue_size: usize,
    /// How long a closed run stays subscribable.
    #[serde(default = "default_close_grace_period_ms")]
    pub close_grace_period_ms: u64,
    /// Default retry policy for retryable step outcomes.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replay_buffer_size: default_replay_buffer_size(),
            subscriber_queue_size: default_subscriber_queue_size(),
            close_grace_period_ms: default_close_grace_period_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the replay buffer size.
    #[must_use]
    pub fn with_replay_buffer_size(mut self, size: usize) -> Self {
        self.replay_buffer_size = size.max(1);
        self
    }

    /// Sets the per-subscriber queue size.
    #[must_use]
    pub fn with_subscriber_queue_size(mut self, size: usize) -> Self {
        self.subscriber_queue_size = size.max(1);
        self
    }

    /// Sets the close grace period.
    #[must_use]
    pub fn with_close_grace_period(mut self, grace: Duration) -> Self {
        self.close_grace_period_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the default retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid engine configuration")
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Defaults overlaid with `LAUNCHPAD_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().overlay_env(|name| std::env::var(name).ok())
    }

    /// Overlays variables returned by `lookup`; unparsable values are ignored.
    #[must_use]
    pub fn overlay_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parse<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(variable = name, value = %raw, "Ignoring unparsable configuration value");
                    None
                }
            }
        }

        if let Some(v) = parse("LAUNCHPAD_REPLAY_BUFFER", lookup("LAUNCHPAD_REPLAY_BUFFER")) {
            self = self.with_replay_buffer_size(v);
        }
        if let Some(v) = parse("LAUNCHPAD_SUBSCRIBER_QUEUE", lookup("LAUNCHPAD_SUBSCRIBER_QUEUE")) {
            self = self.with_subscriber_queue_size(v);
        }
        if let Some(v) = parse("LAUNCHPAD_GRACE_PERIOD_MS", lookup("LAUNCHPAD_GRACE_PERIOD_MS")) {
            self.close_grace_period_ms = v;
        }
        if let Some(v) = parse("LAUNCHPAD_RETRY_MAX_ATTEMPTS", lookup("LAUNCHPAD_RETRY_MAX_ATTEMPTS")) {
            self.retry = self.retry.with_max_attempts(v);
        }
        if let Some(v) = parse("LAUNCHPAD_RETRY_BASE_DELAY_MS", lookup("LAUNCHPAD_RETRY_BASE_DELAY_MS")) {
            self.retry = self.retry.with_base_delay_ms(v);
        }
        self
    }

    /// Channel sizing derived from this configuration.
    #[must_use]
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            replay_capacity: self.replay_buffer_size.max(1),
            subscriber_queue: self.subscriber_queue_size.max(1),
        }
    }

    /// The close grace period.
    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_period_ms)
    }
}
