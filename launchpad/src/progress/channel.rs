//! Per-run ordered broadcast with bounded replay.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::subscription::{DropNotice, Subscription};
use super::ChannelMetrics;
use crate::core::{EventKind, EventStage, MonotonicCounter, ProgressEvent, RunId, RunSnapshot};

fn default_replay_capacity() -> usize {
    256
}

fn default_subscriber_queue() -> usize {
    64
}

/// Buffer sizes of a progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Events retained for replay to late subscribers.
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
    /// Capacity of each subscriber's live queue.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            replay_capacity: default_replay_capacity(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

struct SubscriberSlot {
    tx: mpsc::Sender<ProgressEvent>,
    notice: DropNotice,
}

#[derive(Default)]
struct ChannelInner {
    buffer: VecDeque<ProgressEvent>,
    subscribers: Vec<SubscriberSlot>,
    snapshot: Option<RunSnapshot>,
    closed_at: Option<Instant>,
}

/// Ordered, multi-subscriber event stream of one run.
///
/// Publishing never blocks: each subscriber owns a bounded queue and a
/// subscriber whose queue is full is disconnected with a `fatal` notice.
/// Sequence numbers come from a counter shared by every channel of the
/// engine, so they are unique across runs.
pub struct ProgressChannel {
    run_id: RunId,
    sequences: Arc<MonotonicCounter>,
    config: ChannelConfig,
    inner: Mutex<ChannelInner>,
    metrics: ChannelMetrics,
}

impl ProgressChannel {
    /// Creates an open channel for `run_id`.
    #[must_use]
    pub fn new(run_id: RunId, sequences: Arc<MonotonicCounter>, config: ChannelConfig) -> Self {
        Self {
            run_id,
            sequences,
            config: ChannelConfig {
                replay_capacity: config.replay_capacity.max(1),
                subscriber_queue: config.subscriber_queue.max(1),
            },
            inner: Mutex::new(ChannelInner::default()),
            metrics: ChannelMetrics::default(),
        }
    }

    /// The run this channel belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Delivery metrics.
    #[must_use]
    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    /// Returns true once the `close` event has been published.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed_at.is_some()
    }

    /// Returns true if the channel closed more than `grace` ago.
    #[must_use]
    pub fn is_expired(&self, grace: Duration) -> bool {
        self.inner
            .lock()
            .closed_at
            .is_some_and(|closed| closed.elapsed() >= grace)
    }

    /// Number of connected live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|slot| !slot.tx.is_closed());
        inner.subscribers.len()
    }

    /// Events currently retained for replay.
    #[must_use]
    pub fn buffered(&self) -> Vec<ProgressEvent> {
        self.inner.lock().buffer.iter().cloned().collect()
    }

    /// Replaces the snapshot handed to late subscribers.
    pub fn update_snapshot(&self, snapshot: RunSnapshot) {
        self.inner.lock().snapshot = Some(snapshot);
    }

    /// Stamps and publishes an event, returning its sequence.
    ///
    /// Returns `None` if the channel is already closed.
    pub fn publish(&self, mut event: ProgressEvent) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.closed_at.is_some() {
            warn!(run_id = %self.run_id, kind = %event.kind, "Dropping event published after close");
            return None;
        }

        event.sequence = self.sequences.next_value();
        event.run_id = self.run_id;
        event.timestamp = chrono::Utc::now();
        log_event(&event);

        inner.buffer.push_back(event.clone());
        while inner.buffer.len() > self.config.replay_capacity {
            inner.buffer.pop_front();
        }

        let mut deliveries = 0;
        let queue = self.config.subscriber_queue;
        let run_id = self.run_id;
        let sequences = &self.sequences;
        let metrics = &self.metrics;
        inner.subscribers.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => {
                deliveries += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                let mut notice = ProgressEvent::fatal(
                    EventStage::Pipeline,
                    format!("subscriber disconnected: more than {queue} events behind"),
                );
                notice.sequence = sequences.next_value();
                notice.run_id = run_id;
                *slot.notice.lock() = Some(notice);
                metrics.record_lag_disconnect();
                warn!(run_id = %run_id, queue, "Disconnected lagging progress subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });

        if event.is_close() {
            inner.closed_at = Some(Instant::now());
            inner.subscribers.clear();
        }

        self.metrics.record_publish(deliveries);
        Some(event.sequence)
    }

    /// Subscribes from the start of the retained buffer.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_after(None)
    }

    /// Subscribes to events with a sequence greater than `after`.
    ///
    /// A subscriber joining an open channel that has already published events
    /// also receives a synthetic snapshot event after the replay.
    #[must_use]
    pub fn subscribe_after(&self, after: Option<u64>) -> Subscription {
        let mut inner = self.inner.lock();
        self.metrics.record_subscribe();

        let mut pending: VecDeque<ProgressEvent> = inner
            .buffer
            .iter()
            .filter(|event| after.map_or(true, |seq| event.sequence > seq))
            .cloned()
            .collect();
        let notice: DropNotice = Arc::new(Mutex::new(None));

        if inner.closed_at.is_some() {
            debug!(run_id = %self.run_id, replay = pending.len(), "Replay-only subscription");
            return Subscription::new(self.run_id, pending, None, notice);
        }

        if !inner.buffer.is_empty() {
            if let Some(snapshot) = inner.snapshot.clone() {
                let mut event = ProgressEvent::info(EventStage::Pipeline, "state snapshot")
                    .with_snapshot(snapshot);
                event.sequence = self.sequences.next_value();
                event.run_id = self.run_id;
                pending.push_back(event);
            }
        }

        let (tx, rx) = mpsc::channel(self.config.subscriber_queue);
        inner.subscribers.push(SubscriberSlot {
            tx,
            notice: notice.clone(),
        });
        debug!(
            run_id = %self.run_id,
            replay = pending.len(),
            subscribers = inner.subscribers.len(),
            "Subscribed to progress channel"
        );
        Subscription::new(self.run_id, pending, Some(rx), notice)
    }
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ProgressChannel")
            .field("run_id", &self.run_id)
            .field("buffered", &inner.buffer.len())
            .field("subscribers", &inner.subscribers.len())
            .field("closed", &inner.closed_at.is_some())
            .finish()
    }
}

fn log_event(event: &ProgressEvent) {
    match event.kind {
        EventKind::Fatal | EventKind::Warn => warn!(
            run_id = %event.run_id,
            stage = %event.stage,
            sequence = event.sequence,
            "{}: {}", event.kind, event.message
        ),
        EventKind::Info | EventKind::Close => info!(
            run_id = %event.run_id,
            stage = %event.stage,
            sequence = event.sequence,
            "{}: {}", event.kind, event.message
        ),
    }
}
