use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::step::StepError;
use crate::event_bus::{Event, EventEmitter};
use crate::store::{StateStore, StateStoreExt};

/// Per-invocation bundle of collaborators handed to a step handler.
///
/// A fresh context is constructed for every invocation and lives exactly as
/// long as it; steps share no mutable state across invocations. The context
/// carries the step's identity and declared emit topics so that publishing
/// can be checked against the declaration.
#[derive(Clone)]
pub struct StepContext {
    step_name: &'static str,
    emits: &'static [&'static str],
    emitter: Arc<dyn EventEmitter>,
    store: Arc<dyn StateStore>,
}

impl StepContext {
    pub fn new(
        step_name: &'static str,
        emits: &'static [&'static str],
        emitter: Arc<dyn EventEmitter>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            step_name,
            emits,
            emitter,
            store,
        }
    }

    pub fn step_name(&self) -> &'static str {
        self.step_name
    }

    /// Publish `payload` on `topic`.
    ///
    /// Fails with [`StepError::UndeclaredTopic`] when the step did not list
    /// the topic in its `emits` declaration; nothing is published in that
    /// case. Steps must only call this after their state writes have
    /// succeeded, so a subscriber triggered by the event always observes the
    /// publisher's recorded state.
    pub fn emit<T: Serialize>(&self, topic: &str, payload: &T) -> Result<(), StepError> {
        if !self.emits.contains(&topic) {
            return Err(StepError::UndeclaredTopic {
                step: self.step_name,
                topic: topic.to_string(),
            });
        }
        let data = serde_json::to_value(payload)?;
        self.emitter.emit(Event::new(topic, data))?;
        Ok(())
    }

    /// The shared state store handle.
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Serialize and persist a state record, replacing any existing record
    /// under `(namespace, key)`.
    pub async fn set_state<T>(&self, namespace: &str, key: &str, value: &T) -> Result<(), StepError>
    where
        T: Serialize + Sync,
    {
        self.store.set_json(namespace, key, value).await?;
        Ok(())
    }

    /// Fetch and deserialize the state record under `(namespace, key)`.
    pub async fn get_state<T>(&self, namespace: &str, key: &str) -> Result<Option<T>, StepError>
    where
        T: DeserializeOwned,
    {
        Ok(self.store.get_json(namespace, key).await?)
    }

    /// Raw (untyped) state read, for records whose shape varies by stage.
    pub async fn get_state_raw(&self, namespace: &str, key: &str) -> Result<Option<Value>, StepError> {
        Ok(self.store.get(namespace, key).await?)
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("step_name", &self.step_name)
            .field("emits", &self.emits)
            .finish_non_exhaustive()
    }
}
