//! Subscriber side of a progress channel.

use futures::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::{ProgressEvent, RunId};

/// Slot through which the channel hands a lagging subscriber its drop notice.
pub(crate) type DropNotice = Arc<Mutex<Option<ProgressEvent>>>;

/// A lazy stream of one run's progress events.
///
/// Yields the replayed buffer first, then live events, and ends after the
/// `close` event (or after a drop notice if the subscriber fell behind).
/// Dropping the subscription unsubscribes without affecting the run.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    run_id: RunId,
    pending: VecDeque<ProgressEvent>,
    live: Option<mpsc::Receiver<ProgressEvent>>,
    notice: DropNotice,
    last_sequence: Option<u64>,
    finished: bool,
}

impl Subscription {
    pub(crate) fn new(
        run_id: RunId,
        pending: VecDeque<ProgressEvent>,
        live: Option<mpsc::Receiver<ProgressEvent>>,
        notice: DropNotice,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            pending,
            live,
            notice,
            last_sequence: None,
            finished: false,
        }
    }

    /// Unique id of this subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The run being observed.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Sequence of the last event yielded, for resuming elsewhere.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Returns true once the stream has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stops observing the run.
    pub fn unsubscribe(self) {}

    fn yield_event(&mut self, event: ProgressEvent, terminal: bool) -> Poll<Option<ProgressEvent>> {
        self.last_sequence = Some(event.sequence);
        if terminal || event.is_close() {
            self.finished = true;
            self.live = None;
        }
        Poll::Ready(Some(event))
    }
}

impl Stream for Subscription {
    type Item = ProgressEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(event) = this.pending.pop_front() {
            return this.yield_event(event, false);
        }

        let Some(live) = this.live.as_mut() else {
            this.finished = true;
            return Poll::Ready(None);
        };

        match live.poll_recv(cx) {
            Poll::Ready(Some(event)) => this.yield_event(event, false),
            Poll::Ready(None) => {
                this.live = None;
                let notice = this.notice.lock().take();
                match notice {
                    Some(event) => this.yield_event(event, true),
                    None => {
                        this.finished = true;
                        Poll::Ready(None)
                    }
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
