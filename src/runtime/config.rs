use crate::dispatch::DispatchConfig;

/// Top-level runtime configuration.
///
/// Defaults give a stdout-only event bus and the dispatch throttle
/// resolved from the environment (`STEPLINE_BATCH_SIZE`,
/// `STEPLINE_BATCH_DELAY_MS`); tests typically swap in a memory sink so
/// published events can be inspected after the fact.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub event_bus: EventBusConfig,
    pub dispatch: DispatchConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_bus: EventBusConfig::default(),
            dispatch: DispatchConfig::from_env(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Which sinks the runner attaches to its event bus.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}

impl EventBusConfig {
    pub fn with_stdout_only() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut],
        }
    }

    /// Memory sink only; the runner keeps a handle so tests can read back
    /// every event that crossed the bus.
    pub fn with_memory_sink() -> Self {
        Self {
            sinks: vec![SinkConfig::Memory],
        }
    }

    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }
}

/// Sink kinds the runner knows how to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}
