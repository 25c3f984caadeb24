//! Step declarations, traits, and the registry.
//!
//! A step couples a static [`StepConfig`] declaration with one typed
//! handler trait per trigger kind: [`ApiStep`] for inbound requests,
//! [`EventStep`] for topic subscriptions, [`CronStep`] for scheduled
//! runs. The [`StepRegistry`] validates declarations at registration time
//! and hands the runtime type-erased adapters that decode payloads before
//! any handler body runs.

pub mod config;
pub mod context;
pub mod registry;
pub mod step;

pub use config::{StepConfig, Trigger, TriggerKind};
pub use context::StepContext;
pub use registry::{RegistryError, StepRegistry};
pub use step::{ApiStep, CronStep, EventStep, StepError};
