//! Runtime wiring: configuration, the step runner, and request responses.

pub mod config;
pub mod response;
pub mod runner;

pub use config::{EventBusConfig, RuntimeConfig, SinkConfig};
pub use response::{ApiErrorIssue, ApiErrorKind, ApiResponse};
pub use runner::{RunnerError, StepRunner};
