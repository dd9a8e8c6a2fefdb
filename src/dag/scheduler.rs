// src/dag/scheduler.rs

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::catalog::UnitPath;
use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::unit_info::{ExecutionRecord, RunSummary, UnitInfo};
use crate::engine::UnitOutcome;
use crate::events::LifecycleEvent;
use crate::plan::Plan;
use crate::types::UnitStatus;

/// Knobs that change how the scheduler dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Upper bound on concurrently running units (at least 1).
    pub max_running: usize,
    /// Keep dispatching dependents of failed units.
    pub continue_on_error: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_running: 1,
            continue_on_error: false,
        }
    }
}

/// Scheduler holds the selection's ordering graph plus mutable per-unit state.
///
/// It is responsible for:
/// - starting units once every predecessor is terminal
/// - keeping at most `max_running` units running
/// - canceling descendants of a failed unit (unless continuing on error)
/// - canceling everything still pending on interrupt
///
/// It never touches processes; the engine turns [`SchedulerStep`]s into
/// executor commands.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    units: HashMap<UnitPath, UnitInfo>,
    order: Vec<UnitPath>,
    options: SchedulerOptions,
    running: usize,
    started: bool,
    interrupted: bool,
}

impl Scheduler {
    /// `order` is the reported order (already reversed if requested); it sets
    /// dispatch priority only. Readiness always follows `graph`'s edges.
    pub fn new(
        graph: DagGraph,
        order: Vec<UnitPath>,
        envs: &BTreeMap<UnitPath, BTreeMap<String, String>>,
        options: SchedulerOptions,
    ) -> Self {
        let mut units = HashMap::with_capacity(order.len());
        for (position, path) in order.iter().enumerate() {
            let deps = graph
                .dependencies_of(path)
                .into_iter()
                .map(str::to_string)
                .collect();
            units.insert(
                path.clone(),
                UnitInfo {
                    path: path.clone(),
                    position,
                    deps,
                    env: envs.get(path).cloned().unwrap_or_default(),
                    record: ExecutionRecord::default(),
                },
            );
        }

        let options = SchedulerOptions {
            max_running: options.max_running.max(1),
            ..options
        };

        Self {
            graph,
            units,
            order,
            options,
            running: 0,
            started: false,
            interrupted: false,
        }
    }

    pub fn from_plan(plan: &Plan, options: SchedulerOptions) -> Self {
        let envs = plan
            .units()
            .iter()
            .map(|u| (u.path.clone(), u.env.clone()))
            .collect();
        Self::new(plan.graph().clone(), plan.order().to_vec(), &envs, options)
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    pub fn order(&self) -> &[UnitPath] {
        &self.order
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn status_of(&self, unit: &str) -> Option<UnitStatus> {
        self.units.get(unit).map(UnitInfo::status)
    }

    pub fn record_of(&self, unit: &str) -> Option<&ExecutionRecord> {
        self.units.get(unit).map(|i| &i.record)
    }

    pub fn is_finished(&self) -> bool {
        self.units.values().all(|i| i.status().is_terminal())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            units: self
                .order
                .iter()
                .filter_map(|p| self.units.get(p).map(|i| (p.clone(), i.record.clone())))
                .collect(),
        }
    }

    /// Announce every unit as pending and dispatch the first wave.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!("scheduler already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;

        let transitions = self
            .order
            .iter()
            .filter_map(|p| self.units.get(p))
            .map(|i| LifecycleEvent::now(i.path.clone(), UnitStatus::Pending))
            .collect();

        debug!(
            units = self.order.len(),
            max_running = self.options.max_running,
            "scheduler: starting"
        );

        let mut step = SchedulerStep {
            transitions,
            ..SchedulerStep::default()
        };
        if self.interrupted {
            let mut manager = StateManager::new(&self.graph, &mut self.units, &self.order);
            step.transitions.extend(manager.cancel_all_pending());
            info!("interrupted before start; nothing dispatched");
        }
        self.dispatch(&mut step);
        step
    }

    /// Apply a unit's completion and dispatch whatever it unblocked.
    pub fn step_completion(
        &mut self,
        unit: &str,
        outcome: UnitOutcome,
        output_tail: Vec<String>,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if self.status_of(unit) != Some(UnitStatus::Running) {
            warn!(unit = %unit, "completion for a unit that is not running; ignoring");
            return step;
        }
        self.running = self.running.saturating_sub(1);

        let (status, code) = match outcome {
            UnitOutcome::Success => (UnitStatus::Ok, Some(0)),
            UnitOutcome::Failed(code) => (UnitStatus::Failed, Some(code)),
            UnitOutcome::Canceled => (UnitStatus::Canceled, None),
        };

        let mut manager = StateManager::new(&self.graph, &mut self.units, &self.order);
        step.transitions
            .extend(manager.finish(unit, status, code, output_tail));

        if status == UnitStatus::Failed {
            if self.options.continue_on_error {
                warn!(unit = %unit, exit_code = code, "unit failed; continuing with dependents");
            } else {
                warn!(unit = %unit, exit_code = code, "unit failed; canceling dependents");
                step.transitions.extend(manager.cancel_descendants(unit));
            }
        } else {
            debug!(unit = %unit, %status, "unit finished");
        }

        self.dispatch(&mut step);
        step
    }

    /// Stop dispatching and cancel everything that has not started.
    ///
    /// Running units keep their state until their completion arrives.
    pub fn step_interrupt(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if !self.started {
            // `start` announces the units first, then cancels them.
            self.interrupted = true;
            return step;
        }
        if !self.interrupted {
            self.interrupted = true;
            let mut manager = StateManager::new(&self.graph, &mut self.units, &self.order);
            step.transitions = manager.cancel_all_pending();
            info!(
                canceled = step.transitions.len(),
                running = self.running,
                "interrupted; canceled pending units"
            );
        }
        step.run_just_finished = self.is_finished();
        step
    }

    fn dispatch(&mut self, step: &mut SchedulerStep) {
        if !self.interrupted {
            let slots = self.options.max_running.saturating_sub(self.running);
            if slots > 0 {
                let mut manager = StateManager::new(&self.graph, &mut self.units, &self.order);
                let (ready, events) = manager.collect_new_ready_units(slots);
                self.running += ready.len();
                step.newly_scheduled.extend(ready);
                step.transitions.extend(events);
            }
        }

        step.run_just_finished = self.is_finished();
        if step.run_just_finished {
            info!("scheduler: all units terminal");
        }
    }
}
