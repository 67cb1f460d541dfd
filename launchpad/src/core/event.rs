//! Progress events published on a run's channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EventStage, RunId, RunSnapshot, RunSummary};

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Informational progress.
    Info,
    /// Something went wrong but the run continues.
    Warn,
    /// The run (or this subscription) cannot continue.
    Fatal,
    /// The run reached its terminal state. Always the last event.
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Fatal => write!(f, "fatal"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// An immutable progress event.
///
/// Serializes to the wire shape `{type, stage, msg, sequence, ...}`.
/// `sequence` and `run_id` are stamped by the channel at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// The stage the event concerns.
    pub stage: EventStage,
    /// Human readable message.
    #[serde(rename = "msg")]
    pub message: String,
    /// Position of the event within its run.
    pub sequence: u64,
    /// The run that produced the event.
    pub run_id: RunId,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Terminal summary, present on `close` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    /// State snapshot, present on the synthetic event sent to late subscribers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Box<RunSnapshot>>,
}

impl ProgressEvent {
    /// Creates an unstamped event.
    #[must_use]
    pub fn new(kind: EventKind, stage: impl Into<EventStage>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            message: message.into(),
            sequence: 0,
            run_id: RunId::new(0),
            timestamp: Utc::now(),
            summary: None,
            snapshot: None,
        }
    }

    /// Creates an `info` event.
    #[must_use]
    pub fn info(stage: impl Into<EventStage>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Info, stage, message)
    }

    /// Creates a `warn` event.
    #[must_use]
    pub fn warn(stage: impl Into<EventStage>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Warn, stage, message)
    }

    /// Creates a `fatal` event.
    #[must_use]
    pub fn fatal(stage: impl Into<EventStage>, message: impl Into<String>) -> Self {
        Self::new(EventKind::Fatal, stage, message)
    }

    /// Creates a `close` event carrying the run summary.
    #[must_use]
    pub fn close(stage: impl Into<EventStage>, summary: RunSummary) -> Self {
        let mut event = Self::new(EventKind::Close, stage, summary.describe());
        event.summary = Some(summary);
        event
    }

    /// Attaches a snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: RunSnapshot) -> Self {
        self.snapshot = Some(Box::new(snapshot));
        self
    }

    /// Returns true for the terminal `close` event.
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.kind == EventKind::Close
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
