// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info};

use crate::cancel::Escalation;
use crate::dag::{ScheduledUnit, Scheduler, SchedulerStep};
use crate::engine::UnitOutcome;
use crate::events::LifecycleEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Publish these transitions to the event sinks.
    EmitEvents(Vec<LifecycleEvent>),
    /// Hand these units to the executor.
    DispatchUnits(Vec<ScheduledUnit>),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Events go out before dispatch so sinks see `running` before any output.
fn commands_from(step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();
    if !step.transitions.is_empty() {
        commands.push(CoreCommand::EmitEvents(step.transitions));
    }
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchUnits(step.newly_scheduled));
    }
    CoreStep {
        commands,
        keep_running: !step.run_just_finished,
    }
}

pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    commands_from(scheduler.start())
}

pub fn handle_unit_completion(
    scheduler: &mut Scheduler,
    unit: &str,
    outcome: UnitOutcome,
    output_tail: Vec<String>,
) -> CoreStep {
    debug!(unit = %unit, ?outcome, "unit completed");
    let mut step = commands_from(scheduler.step_completion(unit, outcome, output_tail));
    step.keep_running = !scheduler.is_finished();
    step
}

/// Only the first interrupt changes scheduling; later ones escalate signals
/// inside the job runners.
pub fn handle_interrupt(scheduler: &mut Scheduler, level: Escalation) -> CoreStep {
    if level == Escalation::None {
        return CoreStep {
            commands: Vec::new(),
            keep_running: !scheduler.is_finished(),
        };
    }
    info!(?level, running = scheduler.running_count(), "handling interrupt");
    let mut step = commands_from(scheduler.step_interrupt());
    step.keep_running = !scheduler.is_finished();
    step
}
