use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::timeout;

use super::event::WorkflowEvent;

/// Broadcast fan-out point for event subscribers.
///
/// Subscribers receive every event published after they subscribe; slow
/// subscribers lag rather than block the runner, and dropped events are
/// counted on the hub.
#[derive(Debug)]
pub struct EventHub {
    sender: Sender<WorkflowEvent>,
    dropped_events: AtomicUsize,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            dropped_events: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Publish to all current subscribers. Publishing with no subscribers
    /// is not an error; the event is simply not observed.
    pub fn publish(&self, event: WorkflowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            hub: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events lost to subscriber lag across all streams.
    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// A lazy, ordered, non-restartable view of a run's events.
#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<WorkflowEvent>,
    hub: Arc<EventHub>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<WorkflowEvent, broadcast::error::RecvError> {
        match self.receiver.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::RecvError::Lagged(missed))
            }
            other => other,
        }
    }

    pub fn try_recv(&mut self) -> Result<WorkflowEvent, broadcast::error::TryRecvError> {
        match self.receiver.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::TryRecvError::Lagged(missed))
            }
            other => other,
        }
    }

    /// Next event, or `None` when the stream closed or the timeout expired.
    /// Lagged gaps are skipped.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<WorkflowEvent> {
        loop {
            match timeout(duration, self.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything already buffered without waiting.
    pub fn drain_ready(&mut self) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }

    /// Adapt into a `futures_util::Stream`, skipping lagged gaps and ending
    /// when the hub closes.
    pub fn into_async_stream(self) -> impl futures_util::stream::Stream<Item = WorkflowEvent> {
        stream::unfold(self, |mut s| async move {
            loop {
                match s.recv().await {
                    Ok(event) => return Some((event, s)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}
