//! Progress channels: ordered, multi-subscriber, bounded-replay event
//! broadcast per run.
//!
//! The engine publishes through a [`ProgressChannel`]; observers obtain a
//! [`Subscription`] (a `futures::Stream`) from the [`ProgressHub`].

mod channel;
mod hub;
mod metrics;
mod subscription;
pub mod wire;

pub use channel::{ChannelConfig, ProgressChannel};
pub use hub::ProgressHub;
pub use metrics::ChannelMetrics;
pub use subscription::Subscription;
