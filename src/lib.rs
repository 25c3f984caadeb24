//! # Stepline: Event-driven Step Orchestration
//!
//! Stepline wires small, single-purpose *steps* into workflows over a
//! topic-based event bus, with a namespaced state store recording each
//! workflow instance's progress and a rate-limited batch dispatcher for
//! bulk delivery work.
//!
//! ## Core Concepts
//!
//! - **Steps**: Async handlers bound to exactly one trigger: an inbound
//!   request ([`ApiStep`](steps::ApiStep)), a topic subscription
//!   ([`EventStep`](steps::EventStep)), or a cron schedule
//!   ([`CronStep`](steps::CronStep))
//! - **Event bus**: Topic-routed pub/sub fabric with per-subscription
//!   channels and sink taps for observability
//! - **State store**: Namespaced key/value records with last-write-wins
//!   replacement semantics
//! - **Runner**: Validates payloads against each step's declared input
//!   type, runs one worker per subscription, and maps API outcomes to
//!   structured responses
//! - **Dispatcher**: Splits bulk deliveries into throttled batches with
//!   per-recipient partial-failure accounting
//!
//! ## Quick Start
//!
//! ```no_run
//! use stepline::flows::{data_pipeline, email_campaign, scheduled_tasks};
//! use stepline::runtime::{EventBusConfig, RuntimeConfig, StepRunner};
//! use stepline::steps::StepRegistry;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     stepline::telemetry::init_tracing();
//!
//!     let config = RuntimeConfig::new()
//!         .with_event_bus(EventBusConfig::with_stdout_only());
//!
//!     let mut registry = StepRegistry::new();
//!     registry
//!         .register_api(data_pipeline::FetchData)?
//!         .register_event(data_pipeline::TransformData)?
//!         .register_event(data_pipeline::ValidateData)?
//!         .register_event(data_pipeline::StoreData)?
//!         .register_api(email_campaign::ScheduleCampaign)?
//!         .register_event(email_campaign::GenerateContent)?
//!         .register_event(email_campaign::SendEmails::simulated(
//!             config.dispatch.clone(),
//!         ))?
//!         .register_event(email_campaign::TrackEngagement)?
//!         .register_cron(scheduled_tasks::CleanupOldData)?
//!         .register_cron(scheduled_tasks::DailyReportGenerator)?
//!         .register_cron(scheduled_tasks::SystemHealthCheck::default())?;
//!
//!     let mut runner = StepRunner::new(registry, &config);
//!     runner.start();
//!
//!     let response = runner
//!         .handle_request(
//!             "/pipeline/fetch",
//!             json!({"source": "api.example.com", "batchSize": 5}),
//!         )
//!         .await
//!         .map_err(miette::Report::new)?;
//!     println!("{} {}", response.status(), response.body());
//!
//!     runner.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Delivery Guarantees
//!
//! Events are delivered at-least-once per live subscription; publishing to
//! a topic nobody subscribes to is a no-op. Failed handler invocations are
//! logged, never retried: the workflow instance stays in its last recorded
//! state.

pub mod dispatch;
pub mod event_bus;
pub mod flows;
pub mod runtime;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod utils;
