use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::timeout;

use super::event::Event;

/// Receiving side of a topic subscription.
///
/// Every subscription has its own unbounded channel, so a slow consumer can
/// never block delivery to other subscribers of the same topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: flume::Receiver<Event>,
}

impl Subscription {
    pub(crate) fn new(topic: String, receiver: flume::Receiver<Event>) -> Self {
        Self { topic, receiver }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event on this subscription.
    ///
    /// Returns `Err` once the bus (and thus the sending side) is gone.
    pub async fn recv(&mut self) -> Result<Event, flume::RecvError> {
        self.receiver.recv_async().await
    }

    pub fn try_recv(&mut self) -> Result<Event, flume::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Wait up to `duration` for the next event; `None` on timeout or closure.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<Event> {
        match timeout(duration, self.recv()).await {
            Ok(Ok(event)) => Some(event),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Adapt the subscription into an async stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        stream::unfold(self, |mut sub| async move {
            match sub.recv().await {
                Ok(event) => Some((event, sub)),
                Err(_) => None,
            }
        })
    }
}
