// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::{CancelContext, Escalation};
use crate::dag::{RunSummary, ScheduledUnit};
use crate::errors::Result;
use crate::events::EventEmitter;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and interrupts, and
/// delegates actual execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`: the loop is the only writer
/// of unit state, executors only report completions.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    emitter: EventEmitter,
    cancel: CancelContext,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        emitter: EventEmitter,
        cancel: CancelContext,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            emitter,
            cancel,
        }
    }

    /// Main event loop; returns once every selected unit is terminal.
    ///
    /// - Consumes completions from `event_rx`.
    /// - Turns interrupt count changes into `RuntimeEvent::Interrupted`.
    /// - Executes the commands returned by the core.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("stackdag runtime started");

        let mut cancel_rx = self.cancel.subscribe();

        // An interrupt that landed before the loop started still counts.
        let early = Escalation::from_count(*cancel_rx.borrow_and_update());
        if early != Escalation::None {
            self.apply(Some(RuntimeEvent::Interrupted(early))).await?;
        }
        let mut keep_running = self.apply(None).await?;

        while keep_running {
            let event = tokio::select! {
                received = self.event_rx.recv() => match received {
                    Some(e) => e,
                    None => {
                        warn!("runtime event channel closed with units still running");
                        break;
                    }
                },
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        continue;
                    }
                    let level = Escalation::from_count(*cancel_rx.borrow_and_update());
                    RuntimeEvent::Interrupted(level)
                }
            };

            debug!(?event, "runtime received event");
            keep_running = self.apply(Some(event)).await?;
        }

        let summary = self.core.summary();
        info!(
            units = summary.units.len(),
            success = summary.is_success(),
            "runtime exiting"
        );
        Ok(summary)
    }

    /// Feed one event (or the start signal) into the core and execute the
    /// commands it returns.
    async fn apply(&mut self, event: Option<RuntimeEvent>) -> Result<bool> {
        let step = match event {
            None => self.core.start(),
            Some(event) => self.core.step(event),
        };

        for command in step.commands {
            self.execute_command(command).await?;
        }

        Ok(step.keep_running)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::EmitEvents(events) => {
                self.emitter.emit_all(&events);
            }
            CoreCommand::DispatchUnits(units) => {
                self.spawn_ready(units).await?;
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, units: Vec<ScheduledUnit>) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = units.iter().map(|u| u.path.as_str()).collect();
        debug!(?names, "spawning ready units");

        self.executor.spawn_ready_units(units).await
    }
}
