//! Topic-based event bus: publish/subscribe fabric, sinks, and emitter APIs.
//!
//! The module is organised around an inbox-plus-listener [`EventBus`] that
//! routes each published [`Event`] to the per-topic [`Subscription`]s and to
//! the configured observability sinks.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod sink;
pub mod subscription;

pub use bus::{BusEmitter, EventBus};
pub use emitter::{EmitterError, EventEmitter};
pub use event::Event;
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
pub use subscription::Subscription;
