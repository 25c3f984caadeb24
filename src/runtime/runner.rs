use std::sync::Arc;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tokio::task;

use super::config::{RuntimeConfig, SinkConfig};
use super::response::{ApiErrorIssue, ApiResponse};
use crate::event_bus::{EventBus, EventEmitter, MemorySink, StdOutSink, Subscription};
use crate::steps::registry::ErasedEventStep;
use crate::steps::{StepContext, StepError, StepRegistry};
use crate::store::{MemoryStateStore, StateStore};

/// Drives registered steps: dispatches inbound requests to API steps, runs
/// one worker per (event step, subscribed topic) pair off the bus, and
/// exposes cron steps for an external scheduler to fire.
///
/// Every invocation gets a fresh [`StepContext`]; steps hold no state of
/// their own between invocations, so the runner never serializes handler
/// executions against each other.
pub struct StepRunner {
    registry: Arc<StepRegistry>,
    bus: EventBus,
    store: Arc<dyn StateStore>,
    memory_sink: Option<MemorySink>,
    workers: Vec<task::JoinHandle<()>>,
    started: bool,
}

impl StepRunner {
    /// Build a runner over `registry` with the sinks named in `config` and
    /// an in-memory state store.
    pub fn new(registry: StepRegistry, config: &RuntimeConfig) -> Self {
        let mut memory_sink = None;
        let bus = EventBus::with_sinks(Vec::new());
        for sink in &config.event_bus.sinks {
            match sink {
                SinkConfig::StdOut => bus.add_sink(StdOutSink::default()),
                SinkConfig::Memory => {
                    let sink = MemorySink::new();
                    memory_sink = Some(sink.clone());
                    bus.add_sink(sink);
                }
            }
        }
        Self {
            registry: Arc::new(registry),
            bus,
            store: Arc::new(MemoryStateStore::new()),
            memory_sink,
            workers: Vec::new(),
            started: false,
        }
    }

    /// Swap the state store backend. Must be called before [`start`](Self::start).
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Swap in a pre-built bus (with whatever sinks it already carries),
    /// discarding the one built from the config. Must be called before
    /// [`start`](Self::start).
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self.memory_sink = None;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Handle to the memory sink, when one was configured.
    pub fn memory_sink(&self) -> Option<&MemorySink> {
        self.memory_sink.as_ref()
    }

    /// Register an external subscription on the runner's bus. Useful for
    /// tests and for bridging events out of the process.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        self.bus.subscribe(topic)
    }

    /// Start the bus listener and one worker task per (event step, topic)
    /// pair. Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.bus.listen_for_events();

        for step in self.registry.event_steps() {
            let config = step.config();
            let crate::steps::Trigger::Event { subscribes } = config.trigger else {
                continue;
            };
            for topic in subscribes {
                let subscription = self.bus.subscribe(topic);
                let worker = EventWorker {
                    step: Arc::clone(step),
                    emitter: Arc::new(self.bus.emitter()),
                    store: Arc::clone(&self.store),
                };
                self.workers.push(task::spawn(worker.run(subscription)));
            }
        }
    }

    /// Dispatch an inbound request body to the API step routed at `path`.
    ///
    /// Handler outcomes map onto the response: success becomes a 200 with
    /// the serialized response, request validation failures become a 400
    /// with a machine-readable body, anything else becomes a 500.
    pub async fn handle_request(&self, path: &str, body: Value) -> Result<ApiResponse, RunnerError> {
        let step = self
            .registry
            .api_steps()
            .iter()
            .find(|s| s.path() == path)
            .ok_or_else(|| RunnerError::UnknownRoute {
                path: path.to_string(),
            })?;

        let config = step.config();
        let ctx = self.context_for(config.name, config.emits);
        match step.invoke(body, ctx).await {
            Ok(response) => Ok(ApiResponse::ok(response)),
            Err(StepError::InvalidRequest { source }) => Ok(ApiResponse::bad_request(
                "request body failed validation".to_string(),
                vec![ApiErrorIssue {
                    message: source.to_string(),
                }],
            )),
            Err(StepError::Validation(message)) => {
                Ok(ApiResponse::bad_request(message, Vec::new()))
            }
            Err(error) => {
                tracing::error!(step = config.name, %error, "api step failed");
                Ok(ApiResponse::internal_error(
                    "internal error while handling request".to_string(),
                ))
            }
        }
    }

    /// Invoke the cron step named `name` once, as an external scheduler
    /// would at one of its scheduled instants.
    pub async fn run_cron(&self, name: &str) -> Result<(), RunnerError> {
        let step = self
            .registry
            .cron_steps()
            .iter()
            .find(|s| s.config().name == name)
            .ok_or_else(|| RunnerError::UnknownCron {
                name: name.to_string(),
            })?;

        let config = step.config();
        let ctx = self.context_for(config.name, config.emits);
        step.invoke(ctx).await?;
        Ok(())
    }

    /// `(step name, cron expression)` for every registered cron step, for
    /// the scheduler that owns the clock.
    pub fn cron_schedules(&self) -> Vec<(&'static str, &'static str)> {
        self.registry
            .cron_steps()
            .iter()
            .filter_map(|s| {
                let config = s.config();
                match config.trigger {
                    crate::steps::Trigger::Cron { schedule } => Some((config.name, schedule)),
                    _ => None,
                }
            })
            .collect()
    }

    /// Stop workers and the bus listener. Events still queued on worker
    /// subscriptions are dropped.
    pub async fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        self.bus.stop_listener().await;
        self.started = false;
    }

    fn context_for(&self, name: &'static str, emits: &'static [&'static str]) -> StepContext {
        StepContext::new(
            name,
            emits,
            Arc::new(self.bus.emitter()),
            Arc::clone(&self.store),
        )
    }
}

struct EventWorker {
    step: Arc<dyn ErasedEventStep>,
    emitter: Arc<dyn EventEmitter>,
    store: Arc<dyn StateStore>,
}

impl EventWorker {
    async fn run(self, mut subscription: Subscription) {
        let config = self.step.config();
        while let Ok(event) = subscription.recv().await {
            let ctx = StepContext::new(
                config.name,
                config.emits,
                Arc::clone(&self.emitter),
                Arc::clone(&self.store),
            );
            match self.step.invoke(event, ctx).await {
                Ok(()) => {}
                Err(error @ StepError::InvalidPayload { .. }) => {
                    tracing::warn!(step = config.name, %error, "dropping event: payload failed validation");
                }
                Err(error) => {
                    tracing::error!(
                        step = config.name,
                        %error,
                        "step failed; workflow instance left in last recorded state"
                    );
                }
            }
        }
    }
}

/// Errors surfaced by the runner itself (as opposed to step outcomes,
/// which become [`ApiResponse`]s or logs).
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("no api step routed at '{path}'")]
    #[diagnostic(code(stepline::runtime::unknown_route))]
    UnknownRoute { path: String },

    #[error("no cron step named '{name}'")]
    #[diagnostic(code(stepline::runtime::unknown_cron))]
    UnknownCron { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] StepError),
}
