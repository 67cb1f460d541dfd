//! Transport framing for progress events.
//!
//! The event JSON is the same for every transport; these helpers only add
//! the Server-Sent Events envelope used by the dashboard stream.

use crate::core::ProgressEvent;

/// Encodes an event as one SSE frame.
///
/// The sequence is used as the SSE `id`, so a reconnecting client's
/// `Last-Event-ID` can be passed to `subscribe_after`.
pub fn sse_frame(event: &ProgressEvent) -> serde_json::Result<String> {
    Ok(format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        event.sequence,
        event.kind,
        event.to_json()?
    ))
}

/// Parses a `Last-Event-ID` header value.
#[must_use]
pub fn parse_last_event_id(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
