use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use super::config::{StepConfig, Trigger, TriggerKind};
use super::context::StepContext;
use super::step::{ApiStep, CronStep, EventStep, StepError};
use crate::event_bus::Event;

/// Collection of registered steps, validated at registration time.
///
/// Registration erases the steps' typed payloads behind object-safe
/// adapters; the adapters decode payloads into the step's declared input
/// type before the handler body runs, so a malformed payload can never
/// reach a handler.
#[derive(Default)]
pub struct StepRegistry {
    api: Vec<Arc<dyn ErasedApiStep>>,
    event: Vec<Arc<dyn ErasedEventStep>>,
    cron: Vec<Arc<dyn ErasedCronStep>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("api", &self.api.len())
            .field("event", &self.event.len())
            .field("cron", &self.cron.len())
            .finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request-triggered step.
    pub fn register_api<S: ApiStep>(&mut self, step: S) -> Result<&mut Self, RegistryError> {
        let config = step.config();
        self.check_unique_name(&config)?;
        let Trigger::Api { path, .. } = config.trigger else {
            return Err(RegistryError::TriggerMismatch {
                step: config.name,
                expected: TriggerKind::Api,
                declared: config.trigger.kind(),
            });
        };
        if self.api.iter().any(|s| s.path() == path) {
            return Err(RegistryError::DuplicatePath {
                step: config.name,
                path,
            });
        }
        self.api.push(Arc::new(ApiAdapter { step, path }));
        Ok(self)
    }

    /// Register an event-triggered step.
    pub fn register_event<S: EventStep>(&mut self, step: S) -> Result<&mut Self, RegistryError> {
        let config = step.config();
        self.check_unique_name(&config)?;
        if config.trigger.kind() != TriggerKind::Event {
            return Err(RegistryError::TriggerMismatch {
                step: config.name,
                expected: TriggerKind::Event,
                declared: config.trigger.kind(),
            });
        }
        self.event.push(Arc::new(EventAdapter { step }));
        Ok(self)
    }

    /// Register a time-triggered step.
    pub fn register_cron<S: CronStep>(&mut self, step: S) -> Result<&mut Self, RegistryError> {
        let config = step.config();
        self.check_unique_name(&config)?;
        if config.trigger.kind() != TriggerKind::Cron {
            return Err(RegistryError::TriggerMismatch {
                step: config.name,
                expected: TriggerKind::Cron,
                declared: config.trigger.kind(),
            });
        }
        self.cron.push(Arc::new(CronAdapter { step }));
        Ok(self)
    }

    /// Declarations of every registered step, in registration order.
    pub fn step_configs(&self) -> Vec<StepConfig> {
        let mut configs: Vec<StepConfig> = Vec::new();
        configs.extend(self.api.iter().map(|s| s.config()));
        configs.extend(self.event.iter().map(|s| s.config()));
        configs.extend(self.cron.iter().map(|s| s.config()));
        configs
    }

    pub(crate) fn api_steps(&self) -> &[Arc<dyn ErasedApiStep>] {
        &self.api
    }

    pub(crate) fn event_steps(&self) -> &[Arc<dyn ErasedEventStep>] {
        &self.event
    }

    pub(crate) fn cron_steps(&self) -> &[Arc<dyn ErasedCronStep>] {
        &self.cron
    }

    fn check_unique_name(&self, config: &StepConfig) -> Result<(), RegistryError> {
        let taken = self
            .step_configs()
            .iter()
            .any(|existing| existing.name == config.name);
        if taken {
            return Err(RegistryError::DuplicateName { step: config.name });
        }
        Ok(())
    }
}

/// Errors raised while registering steps.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("step '{step}' declares a {declared} trigger but was registered as {expected}")]
    #[diagnostic(
        code(stepline::registry::trigger_mismatch),
        help("Use the register_* method matching the step's declared trigger kind.")
    )]
    TriggerMismatch {
        step: &'static str,
        expected: TriggerKind,
        declared: TriggerKind,
    },

    #[error("a step named '{step}' is already registered")]
    #[diagnostic(code(stepline::registry::duplicate_name))]
    DuplicateName { step: &'static str },

    #[error("step '{step}' declares path '{path}' which is already routed")]
    #[diagnostic(code(stepline::registry::duplicate_path))]
    DuplicatePath {
        step: &'static str,
        path: &'static str,
    },
}

/* ---------- type-erased adapters ---------- */

#[async_trait]
pub(crate) trait ErasedApiStep: Send + Sync {
    fn config(&self) -> StepConfig;
    fn path(&self) -> &'static str;
    async fn invoke(&self, body: Value, ctx: StepContext) -> Result<Value, StepError>;
}

struct ApiAdapter<S> {
    step: S,
    // Captured at registration, where the trigger kind was checked.
    path: &'static str,
}

#[async_trait]
impl<S: ApiStep> ErasedApiStep for ApiAdapter<S> {
    fn config(&self) -> StepConfig {
        self.step.config()
    }

    fn path(&self) -> &'static str {
        self.path
    }

    async fn invoke(&self, body: Value, ctx: StepContext) -> Result<Value, StepError> {
        let request: S::Request =
            serde_json::from_value(body).map_err(|source| StepError::InvalidRequest { source })?;
        let response = self.step.handle(request, ctx).await?;
        Ok(serde_json::to_value(response)?)
    }
}

#[async_trait]
pub(crate) trait ErasedEventStep: Send + Sync {
    fn config(&self) -> StepConfig;
    async fn invoke(&self, event: Event, ctx: StepContext) -> Result<(), StepError>;
}

struct EventAdapter<S> {
    step: S,
}

#[async_trait]
impl<S: EventStep> ErasedEventStep for EventAdapter<S> {
    fn config(&self) -> StepConfig {
        self.step.config()
    }

    async fn invoke(&self, event: Event, ctx: StepContext) -> Result<(), StepError> {
        let topic = event.topic().to_string();
        let input: S::Input = serde_json::from_value(event.into_data())
            .map_err(|source| StepError::InvalidPayload { topic, source })?;
        self.step.handle(input, ctx).await
    }
}

#[async_trait]
pub(crate) trait ErasedCronStep: Send + Sync {
    fn config(&self) -> StepConfig;
    async fn invoke(&self, ctx: StepContext) -> Result<(), StepError>;
}

struct CronAdapter<S> {
    step: S,
}

#[async_trait]
impl<S: CronStep> ErasedCronStep for CronAdapter<S> {
    fn config(&self) -> StepConfig {
        self.step.config()
    }

    async fn invoke(&self, ctx: StepContext) -> Result<(), StepError> {
        self.step.handle(ctx).await
    }
}
