//! Step traits and the error taxonomy shared by all trigger kinds.
//!
//! A step is one handler bound to exactly one trigger: an inbound request,
//! a topic subscription, or a cron schedule. Handlers receive a typed
//! payload (already validated by the runtime) plus a scoped [`StepContext`]
//! and perform the stage pattern: write an intermediate state record, do
//! the work, write the outcome record, publish the declared topic(s).

use async_trait::async_trait;
use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::config::StepConfig;
use super::context::StepContext;
use crate::event_bus::EmitterError;
use crate::store::StateStoreError;

/// A step invoked synchronously by an inbound request.
///
/// The runtime decodes the request body into `Request` before the handler
/// runs; a decode failure becomes a structured 400 response and the handler
/// body never executes.
#[async_trait]
pub trait ApiStep: Send + Sync + 'static {
    type Request: DeserializeOwned + Send;
    type Response: Serialize + Send;

    fn config(&self) -> StepConfig;

    async fn handle(
        &self,
        request: Self::Request,
        ctx: StepContext,
    ) -> Result<Self::Response, StepError>;
}

/// A step invoked by the bus for each event on its subscribed topic(s).
///
/// The runtime decodes the event payload into `Input` before the handler
/// runs. Validation fails closed: a malformed payload is logged and dropped
/// without invoking the handler and without publishing anything.
#[async_trait]
pub trait EventStep: Send + Sync + 'static {
    type Input: DeserializeOwned + Send;

    fn config(&self) -> StepConfig;

    async fn handle(&self, input: Self::Input, ctx: StepContext) -> Result<(), StepError>;
}

/// A step invoked by an external scheduler at cron-specified instants.
/// Receives no external payload.
#[async_trait]
pub trait CronStep: Send + Sync + 'static {
    fn config(&self) -> StepConfig;

    async fn handle(&self, ctx: StepContext) -> Result<(), StepError>;
}

/// Errors that can occur during step invocation.
///
/// Infrastructure failures (`State`, `EventBus`) are fatal for the current
/// invocation: the workflow instance is left in its last recorded state and
/// nothing is retried automatically.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// Event payload did not match the step's declared input shape.
    #[error("payload on topic '{topic}' failed validation: {source}")]
    #[diagnostic(
        code(stepline::step::invalid_payload),
        help("The publisher and subscriber disagree on the topic's payload shape.")
    )]
    InvalidPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    /// Inbound request body did not match the step's declared request shape.
    #[error("request body failed validation: {source}")]
    #[diagnostic(code(stepline::step::invalid_request))]
    InvalidRequest {
        #[source]
        source: serde_json::Error,
    },

    /// Handler-level input validation failed (surfaced as a 400 response
    /// for request-triggered steps).
    #[error("validation failed: {0}")]
    #[diagnostic(code(stepline::step::validation))]
    Validation(String),

    /// The step tried to publish a topic missing from its `emits` declaration.
    #[error("step '{step}' attempted to publish undeclared topic '{topic}'")]
    #[diagnostic(
        code(stepline::step::undeclared_topic),
        help("Add the topic to the step's `emits` declaration.")
    )]
    UndeclaredTopic { step: &'static str, topic: String },

    /// State store failure; the triggering event must not be acknowledged by
    /// publishing a continuation.
    #[error("state store failure: {0}")]
    #[diagnostic(code(stepline::step::state))]
    State(#[from] StateStoreError),

    /// Event bus failure while publishing.
    #[error("event bus failure: {0}")]
    #[diagnostic(code(stepline::step::event_bus))]
    EventBus(#[from] EmitterError),

    /// JSON serialization failure for an outbound payload or response.
    #[error("serialization failed: {0}")]
    #[diagnostic(code(stepline::step::serde))]
    Serde(#[from] serde_json::Error),
}
