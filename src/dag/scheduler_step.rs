// src/dag/scheduler_step.rs

use crate::dag::unit_info::ScheduledUnit;
use crate::events::LifecycleEvent;

/// Structured result of a single scheduler step.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Units that should be started now.
    pub newly_scheduled: Vec<ScheduledUnit>,
    /// Every status change applied by this step, in application order.
    pub transitions: Vec<LifecycleEvent>,
    /// Whether this step left every unit terminal.
    pub run_just_finished: bool,
}
