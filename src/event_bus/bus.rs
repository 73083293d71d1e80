use std::sync::{Arc, Mutex};
use tokio::{sync::oneshot, task};

use super::emitter::BusEmitter;
use super::event::WorkflowEvent;
use super::hub::{EventHub, EventStream};
use super::sink::EventSink;

/// Receives events from the runner and broadcasts them to sinks and
/// subscriber streams.
///
/// The runner emits through a flume channel; a background listener task
/// forwards each event to every registered [`EventSink`] and publishes it
/// on the broadcast [`EventHub`] for [`EventStream`] subscribers.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<WorkflowEvent>, flume::Receiver<WorkflowEvent>),
    hub: Arc<EventHub>,
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sinks(Vec::new(), EventHub::new(1024))
    }
}

impl EventBus {
    pub fn with_sink<T>(sink: T, hub: Arc<EventHub>) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)], hub)
    }

    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>, hub: Arc<EventHub>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::unbounded(),
            hub,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Emitter handle for producers.
    pub fn emitter(&self) -> BusEmitter {
        BusEmitter {
            sender: self.event_channel.0.clone(),
        }
    }

    /// Subscribe to the broadcast side. Events published before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Spawn the background listener that forwards events to sinks and the
    /// hub. Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let hub = self.hub.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            {
                                let mut sinks_guard = sinks.lock().unwrap();
                                for sink in sinks_guard.iter_mut() {
                                    if let Err(e) = sink.handle(&event) {
                                        tracing::warn!(error = %e, "event sink error");
                                    }
                                }
                            }
                            hub.publish(event);
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock()
            && let Some(state) = guard.take()
        {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
