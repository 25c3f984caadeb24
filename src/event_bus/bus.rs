use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::{sync::oneshot, task};

use super::emitter::{EmitterError, EventEmitter};
use super::event::Event;
use super::sink::{EventSink, StdOutSink};
use super::subscription::Subscription;

/// Topic-based publish/subscribe fabric.
///
/// The bus receives events through a single inbox channel and fans them out
/// from a background listener task:
///
/// - to every [`Subscription`] registered for the event's topic (each
///   subscription has its own channel, so delivery to one subscriber never
///   blocks another), and
/// - to every configured [`EventSink`], regardless of topic, as an
///   observability tap.
///
/// Delivery is at-least-once per subscriber. Publishing to a topic with zero
/// subscribers is a no-op (the event still reaches the sinks). The bus does
/// not retry failed handler invocations; retry policy belongs to callers.
pub struct EventBus {
    event_channel: (flume::Sender<Event>, flume::Receiver<Event>),
    routes: Arc<Mutex<FxHashMap<String, Vec<flume::Sender<Event>>>>>,
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create an EventBus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create an EventBus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            event_channel: flume::unbounded(),
            routes: Arc::new(Mutex::new(FxHashMap::default())),
            sinks: Arc::new(Mutex::new(sinks)),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink.
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().push(Box::new(sink));
    }

    /// Enqueue an event for all current subscribers of its topic.
    pub fn publish(&self, event: Event) -> Result<(), EmitterError> {
        self.event_channel
            .0
            .send(event)
            .map_err(|_| EmitterError::Closed)
    }

    /// Convenience wrapper building the [`Event`] from topic and payload.
    pub fn publish_json(&self, topic: &str, data: Value) -> Result<(), EmitterError> {
        self.publish(Event::new(topic, data))
    }

    /// Register a new subscription for `topic`.
    ///
    /// Every call creates an independent channel; an event published on the
    /// topic is delivered once per live subscription. Dropping the returned
    /// [`Subscription`] detaches it (the route is pruned on next delivery).
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = flume::unbounded();
        self.routes
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Subscription::new(topic.to_string(), rx)
    }

    /// Get an emitter handle that producers can clone.
    pub fn emitter(&self) -> BusEmitter {
        BusEmitter {
            sender: self.event_channel.0.clone(),
        }
    }

    /// Spawn a background task that routes events to subscribers and sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return; // Already listening
        }

        let receiver = self.event_channel.1.clone();
        let routes = Arc::clone(&self.routes);
        let sinks = Arc::clone(&self.sinks);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            {
                                let mut routes = routes.lock();
                                if let Some(subscribers) = routes.get_mut(event.topic()) {
                                    // Prune subscriptions whose receiver is gone.
                                    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
                                }
                            }
                            let mut sinks = sinks.lock();
                            for sink in sinks.iter_mut() {
                                if let Err(e) = sink.handle(&event) {
                                    tracing::warn!(error = %e, "event sink error");
                                }
                            }
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
            let mut guard = self.listener.lock();
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
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

/// Cloneable emitter handle backed by the bus inbox.
#[derive(Clone, Debug)]
pub struct BusEmitter {
    sender: flume::Sender<Event>,
}

impl EventEmitter for BusEmitter {
    fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.sender.send(event).map_err(|_| EmitterError::Closed)
    }
}
