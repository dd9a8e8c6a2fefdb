// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! hands `ScheduledUnit`s to the executor and publishes lifecycle events.
//! The core itself has no channels, no Tokio types and performs no IO.

use crate::dag::{RunSummary, Scheduler};
use crate::engine::event_handlers::{
    handle_interrupt, handle_start, handle_unit_completion, CoreStep,
};
use crate::engine::RuntimeEvent;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Announce every unit and dispatch the first wave.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::UnitCompleted {
                unit,
                outcome,
                output_tail,
            } => handle_unit_completion(&mut self.scheduler, &unit, outcome, output_tail),
            RuntimeEvent::Interrupted(level) => handle_interrupt(&mut self.scheduler, level),
        }
    }

    pub fn summary(&self) -> RunSummary {
        self.scheduler.summary()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cancel::Escalation;
    use crate::catalog::Unit;
    use crate::dag::{topological_order, DagGraph, SchedulerOptions};
    use crate::diagnostics::Diagnostics;
    use crate::engine::{CoreCommand, UnitOutcome};
    use crate::types::UnitStatus;

    fn core(spec: &[(&str, &[&str])], max_running: usize) -> CoreRuntime {
        let units: Vec<Unit> = spec
            .iter()
            .map(|(path, after)| {
                let mut u = Unit::new(*path);
                u.after = after.iter().map(|a| a.parse().unwrap()).collect();
                u
            })
            .collect();
        let graph = DagGraph::build(&units, &mut Diagnostics::new());
        let order = topological_order(&graph).unwrap();
        CoreRuntime::new(Scheduler::new(
            graph,
            order,
            &BTreeMap::new(),
            SchedulerOptions {
                max_running,
                continue_on_error: false,
            },
        ))
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchUnits(units) => Some(units),
                _ => None,
            })
            .flatten()
            .map(|u| u.path.clone())
            .collect()
    }

    fn emitted(step: &CoreStep) -> Vec<(String, UnitStatus)> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::EmitEvents(events) => Some(events),
                _ => None,
            })
            .flatten()
            .map(|e| (e.unit.clone(), e.status))
            .collect()
    }

    #[test]
    fn events_precede_dispatch() {
        let mut core = core(&[("/a", &[])], 1);
        let step = core.start();
        assert!(matches!(step.commands[0], CoreCommand::EmitEvents(_)));
        assert!(matches!(step.commands[1], CoreCommand::DispatchUnits(_)));
        assert_eq!(
            emitted(&step),
            vec![
                ("/a".to_string(), UnitStatus::Pending),
                ("/a".to_string(), UnitStatus::Running),
            ]
        );
        assert!(step.keep_running);
    }

    #[test]
    fn completion_dispatches_dependents_and_finishes() {
        let mut core = core(&[("/a", &[]), ("/b", &["/a"])], 2);
        assert_eq!(dispatched(&core.start()), vec!["/a"]);

        let step = core.step(RuntimeEvent::UnitCompleted {
            unit: "/a".into(),
            outcome: UnitOutcome::Success,
            output_tail: vec![],
        });
        assert_eq!(dispatched(&step), vec!["/b"]);

        let step = core.step(RuntimeEvent::UnitCompleted {
            unit: "/b".into(),
            outcome: UnitOutcome::Success,
            output_tail: vec![],
        });
        assert!(!step.keep_running);
        assert!(core.summary().is_success());
    }

    #[test]
    fn interrupt_keeps_running_until_inflight_units_report() {
        let mut core = core(&[("/a", &[]), ("/b", &["/a"])], 1);
        core.start();

        let step = core.step(RuntimeEvent::Interrupted(Escalation::Graceful));
        assert_eq!(emitted(&step), vec![("/b".to_string(), UnitStatus::Canceled)]);
        assert!(step.keep_running);

        let step = core.step(RuntimeEvent::Interrupted(Escalation::Repeat));
        assert!(step.commands.is_empty());

        let step = core.step(RuntimeEvent::UnitCompleted {
            unit: "/a".into(),
            outcome: UnitOutcome::Canceled,
            output_tail: vec![],
        });
        assert!(!step.keep_running);
        assert_eq!(core.summary().exit_code(), 1);
    }
}
