//! Registry of progress channels by run id.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ChannelConfig, ProgressChannel, Subscription};
use crate::core::{MonotonicCounter, RunId};
use crate::errors::{LaunchpadError, Result};

/// Owns every live channel and keeps closed ones around for a grace period
/// so observers that connect just after the run ended still get the replay.
#[derive(Debug)]
pub struct ProgressHub {
    channels: DashMap<RunId, Arc<ProgressChannel>>,
    sequences: Arc<MonotonicCounter>,
    config: ChannelConfig,
    grace: Duration,
}

impl ProgressHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new(config: ChannelConfig, grace: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            sequences: Arc::new(MonotonicCounter::new()),
            config,
            grace,
        }
    }

    /// Opens the channel of a new run.
    pub fn open(&self, run_id: RunId) -> Arc<ProgressChannel> {
        self.sweep();
        let channel = Arc::new(ProgressChannel::new(run_id, self.sequences.clone(), self.config));
        self.channels.insert(run_id, channel.clone());
        channel
    }

    /// Looks up a channel that is open or within its grace period.
    #[must_use]
    pub fn get(&self, run_id: RunId) -> Option<Arc<ProgressChannel>> {
        let channel = self.channels.get(&run_id).map(|c| c.value().clone())?;
        if channel.is_expired(self.grace) {
            self.channels.remove(&run_id);
            return None;
        }
        Some(channel)
    }

    /// Subscribes to a run from the start of its retained buffer.
    pub fn subscribe(&self, run_id: RunId) -> Result<Subscription> {
        self.subscribe_after(run_id, None)
    }

    /// Subscribes to a run's events after a known sequence.
    pub fn subscribe_after(&self, run_id: RunId, after: Option<u64>) -> Result<Subscription> {
        self.get(run_id)
            .map(|channel| channel.subscribe_after(after))
            .ok_or_else(|| LaunchpadError::NotFound(format!("run {run_id}")))
    }

    /// Number of channels held, including closed ones in their grace period.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channels are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Drops channels whose grace period has elapsed.
    pub fn sweep(&self) {
        let grace = self.grace;
        self.channels.retain(|run_id, channel| {
            let keep = !channel.is_expired(grace);
            if !keep {
                debug!(run_id = %run_id, "Evicting closed progress channel");
            }
            keep
        });
    }
}
