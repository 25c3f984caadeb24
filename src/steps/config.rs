use std::fmt;

/// Static declaration of a step: identity, flow membership, the topics it
/// may emit, and the one trigger that invokes it.
///
/// The declaration is the wire contract of a step. The runtime enforces it:
/// payloads are validated against the step's input type before the handler
/// runs, and [`StepContext::emit`](crate::steps::StepContext::emit) rejects
/// topics not listed in `emits`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepConfig {
    pub name: &'static str,
    pub description: &'static str,
    /// Workflow this step belongs to (e.g. `data-processing-pipeline`).
    pub flow: &'static str,
    /// Topics this step is allowed to publish.
    pub emits: &'static [&'static str],
    pub trigger: Trigger,
}

/// The one way a step gets invoked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Invoked synchronously by an inbound request.
    Api {
        method: &'static str,
        path: &'static str,
    },
    /// Invoked by the bus for each event on a subscribed topic.
    Event {
        subscribes: &'static [&'static str],
    },
    /// Invoked by an external scheduler at instants matching a standard
    /// five-field cron expression. The expression is declarative metadata;
    /// this crate does not parse it.
    Cron { schedule: &'static str },
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Api { .. } => TriggerKind::Api,
            Trigger::Event { .. } => TriggerKind::Event,
            Trigger::Cron { .. } => TriggerKind::Cron,
        }
    }
}

/// Discriminant of [`Trigger`], used in registration diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    Api,
    Event,
    Cron,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TriggerKind::Api => "api",
            TriggerKind::Event => "event",
            TriggerKind::Cron => "cron",
        };
        f.write_str(label)
    }
}
