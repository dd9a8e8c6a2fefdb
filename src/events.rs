// src/events.rs

//! Lifecycle event stream.
//!
//! Every status transition of a selected unit (`pending`, `running`, and the
//! terminal `ok` / `failed` / `canceled`) is turned into a
//! [`LifecycleEvent`] the moment the engine applies it, and fanned out to
//! every registered [`EventSink`]. Sinks see events in real time; nothing is
//! batched until the end of the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::catalog::UnitPath;
use crate::errors::{Result, StackdagError};
use crate::types::UnitStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub unit: UnitPath,
    pub status: UnitStatus,
    pub timestamp: DateTime<Utc>,
    /// Set for units that ran a process to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl LifecycleEvent {
    pub fn now(unit: impl Into<UnitPath>, status: UnitStatus) -> Self {
        Self {
            unit: unit.into(),
            status,
            timestamp: Utc::now(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

/// Consumer of lifecycle events.
pub trait EventSink: Send {
    fn emit(&mut self, event: &LifecycleEvent) -> Result<()>;
}

/// Logs each transition as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &LifecycleEvent) -> Result<()> {
        info!(
            unit = %event.unit,
            status = %event.status,
            exit_code = event.exit_code,
            at = %event.timestamp.to_rfc3339(),
            "unit status changed"
        );
        Ok(())
    }
}

/// Writes one JSON object per line, flushing after every event.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &LifecycleEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)
            .map_err(|e| StackdagError::Other(e.into()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { tx }
    }

    /// Convenience: a sink plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: &LifecycleEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|e| StackdagError::Other(anyhow::anyhow!("event consumer gone: {e}")))
    }
}

/// Fans events out to every sink. A failing sink is logged, never fatal.
#[derive(Default)]
pub struct EventEmitter {
    sinks: Vec<Box<dyn EventSink>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit_all(&mut self, events: &[LifecycleEvent]) {
        for event in events {
            for sink in self.sinks.iter_mut() {
                if let Err(e) = sink.emit(event) {
                    warn!(unit = %event.unit, error = %e, "event sink failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_sink_writes_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&LifecycleEvent::now("/a", UnitStatus::Running)).unwrap();
        sink.emit(&LifecycleEvent::now("/a", UnitStatus::Failed).with_exit_code(Some(2)))
            .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["unit"], "/a");
        assert_eq!(first["status"], "running");
        assert!(first.get("exit_code").is_none());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["status"], "failed");
        assert_eq!(second["exit_code"], 2);
    }

    #[test]
    fn emitter_fans_out_to_channels() {
        let (a, mut rx_a) = ChannelSink::channel();
        let (b, mut rx_b) = ChannelSink::channel();
        let mut emitter = EventEmitter::new().with_sink(a).with_sink(b);

        emitter.emit_all(&[LifecycleEvent::now("/x", UnitStatus::Pending)]);

        assert_eq!(rx_a.try_recv().unwrap().unit, "/x");
        assert_eq!(rx_b.try_recv().unwrap().status, UnitStatus::Pending);
    }
}
