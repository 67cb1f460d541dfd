//! Per-channel delivery metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a channel's events were delivered.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    published: AtomicU64,
    delivered: AtomicU64,
    subscribed: AtomicU64,
    lagged: AtomicU64,
}

impl ChannelMetrics {
    pub(crate) fn record_publish(&self, deliveries: u64) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(deliveries, Ordering::Relaxed);
    }

    pub(crate) fn record_subscribe(&self) {
        self.subscribed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lag_disconnect(&self) {
        self.lagged.fetch_add(1, Ordering::Relaxed);
    }

    /// Events published on the channel.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Live deliveries into subscriber queues.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Subscriptions opened, including replay-only ones.
    #[must_use]
    pub fn subscribed(&self) -> u64 {
        self.subscribed.load(Ordering::Relaxed)
    }

    /// Subscribers disconnected because their queue overflowed.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged.load(Ordering::Relaxed)
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "published": self.published(),
            "delivered": self.delivered(),
            "subscribed": self.subscribed(),
            "lagged": self.lagged(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let metrics = ChannelMetrics::default();
        metrics.record_publish(2);
        metrics.record_publish(0);
        metrics.record_subscribe();
        metrics.record_lag_disconnect();

        assert_eq!(metrics.published(), 2);
        assert_eq!(metrics.delivered(), 2);
        assert_eq!(metrics.subscribed(), 1);
        assert_eq!(metrics.lagged(), 1);
        assert_eq!(metrics.to_dict()["lagged"], 1);
    }
}
