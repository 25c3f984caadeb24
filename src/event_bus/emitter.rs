use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use super::event::Event;

/// Trait representing an abstract event emitter that step invocations can clone.
pub trait EventEmitter: Send + Sync + fmt::Debug {
    /// Emit an event in a synchronous, non-blocking manner.
    fn emit(&self, event: Event) -> Result<(), EmitterError>;
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitterError {
    #[error("event bus closed")]
    #[diagnostic(
        code(stepline::event_bus::closed),
        help("The bus listener has shut down; events can no longer be delivered.")
    )]
    Closed,

    #[error("event emission failed: {0}")]
    #[diagnostic(code(stepline::event_bus::other))]
    Other(String),
}

impl EmitterError {
    pub fn other(error: impl Into<String>) -> Self {
        Self::Other(error.into())
    }
}
