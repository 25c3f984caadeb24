//! Tracing initialization and event rendering for stdout sinks.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::event_bus::Event;

/// Install the global tracing subscriber: env-filtered fmt layer plus an
/// error layer for span traces. Safe to call more than once; later calls
/// are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}

/// Color behavior for rendered events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatterMode {
    /// Color when stderr is a terminal.
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    fn is_colored(self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Renders one [`Event`] to a displayable line for a sink.
pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> String;
}

const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_RESET: &str = "\x1b[0m";

/// One-line formatter: `[topic] payload`, newline-terminated.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> String {
        if self.mode.is_colored() {
            format!("{ANSI_CYAN}[{}]{ANSI_RESET} {}\n", event.topic(), event.data())
        } else {
            format!("{event}\n")
        }
    }
}
