use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single occurrence on the bus: a topic name, an immutable JSON payload,
/// and the instant the event was handed to the bus.
///
/// Events are created and owned by the publishing step. Once published they
/// are read-only and may fan out to zero, one, or many subscribers; each
/// subscriber receives its own copy.
///
/// The payload is carried as raw JSON. Its shape is a contract between the
/// publisher and the subscribers of the topic, enforced at the subscriber
/// boundary where the payload is decoded into the step's declared input type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    topic: String,
    data: Value,
    emitted_at: DateTime<Utc>,
}

impl Event {
    /// Create an event for `topic` carrying `data`, stamped with the current time.
    pub fn new(topic: impl Into<String>, data: Value) -> Self {
        Self {
            topic: topic.into(),
            data,
            emitted_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consume the event, yielding its payload.
    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    /// Convert the event to a structured JSON value with a normalized schema.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use stepline::event_bus::Event;
    ///
    /// let event = Event::new("data-fetched", json!({"pipelineId": "p-1"}));
    /// let value = event.to_json_value();
    ///
    /// assert_eq!(value["topic"], "data-fetched");
    /// assert_eq!(value["data"]["pipelineId"], "p-1");
    /// ```
    pub fn to_json_value(&self) -> Value {
        serde_json::json!({
            "topic": self.topic,
            "data": self.data,
            "emittedAt": self.emitted_at.to_rfc3339(),
        })
    }

    /// Convert the event to a compact JSON string representation.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.topic, self.data)
    }
}
