//! Log collection for the research phase
//!
//! The research service reports progress as loosely-shaped JSON events. Each
//! one is appended to an ordered list and rendered to a side panel right away.

use crate::orchestrator::ShellEvent;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Label used when an event carries no `content` field
pub const PLACEHOLDER_LABEL: &str = "Log...";

/// A structured event emitted by the research service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogEvent(pub Value);

impl LogEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Display label: the `content` field if present, otherwise the placeholder
    pub fn label(&self) -> String {
        match self.0.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => PLACEHOLDER_LABEL.to_string(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for LogEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One rendered side-panel entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Arrival index within the current cycle
    pub seq: usize,
    pub label: String,
    pub event: LogEvent,
}

/// Anything that accepts one structured event at a time
#[async_trait]
pub trait LogSink: Send {
    async fn accept(&mut self, event: LogEvent);
}

/// Where collected entries are displayed
pub trait LogPanel: Send {
    fn render(&mut self, entry: &LogEntry);
}

/// Ordered, in-memory log collector that renders as events arrive
pub struct LogCollector<P> {
    events: Vec<LogEvent>,
    panel: P,
}

impl<P: LogPanel> LogCollector<P> {
    pub fn new(panel: P) -> Self {
        Self {
            events: Vec::new(),
            panel,
        }
    }

    /// Events collected so far, in arrival order
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl<P: LogPanel> LogSink for LogCollector<P> {
    async fn accept(&mut self, event: LogEvent) {
        let entry = LogEntry {
            seq: self.events.len(),
            label: event.label(),
            event,
        };
        self.panel.render(&entry);
        self.events.push(entry.event);
    }
}

/// Forwards entries to the UI shell over its event channel
pub struct ChannelPanel {
    tx: UnboundedSender<ShellEvent>,
}

impl ChannelPanel {
    pub fn new(tx: UnboundedSender<ShellEvent>) -> Self {
        Self { tx }
    }
}

impl LogPanel for ChannelPanel {
    fn render(&mut self, entry: &LogEntry) {
        if self.tx.send(ShellEvent::Log(entry.clone())).is_err() {
            debug!(seq = entry.seq, "Log panel receiver closed, entry not displayed");
        }
    }
}
