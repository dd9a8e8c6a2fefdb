// src/dag/state_manager.rs

//! Per-invocation state transitions for units in the scheduler.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::UnitPath;
use crate::dag::order::descendants_of;
use crate::dag::unit_info::{ScheduledUnit, UnitInfo};
use crate::dag::DagGraph;
use crate::events::LifecycleEvent;
use crate::types::UnitStatus;

/// Applies transitions to the unit map and reports them as events.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    units: &'a mut HashMap<UnitPath, UnitInfo>,
    /// Unit paths in dispatch priority order.
    order: &'a [UnitPath],
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        units: &'a mut HashMap<UnitPath, UnitInfo>,
        order: &'a [UnitPath],
    ) -> Self {
        Self {
            graph,
            units,
            order,
        }
    }

    pub fn deps_satisfied_for_info(&self, info: &UnitInfo) -> bool {
        ReadOnlyStateManager::new(self.units).deps_satisfied_for_info(info)
    }

    /// Move `unit` to `status`, stamping times. Returns the event, or `None`
    /// if the unit is unknown.
    fn transition(&mut self, unit: &str, status: UnitStatus) -> Option<LifecycleEvent> {
        let info = self.units.get_mut(unit)?;
        let now = Utc::now();
        info.record.status = status;
        match status {
            UnitStatus::Running => info.record.started_at = Some(now),
            s if s.is_terminal() => info.record.finished_at = Some(now),
            _ => {}
        }
        Some(LifecycleEvent {
            unit: info.path.clone(),
            status,
            timestamp: now,
            exit_code: info.record.exit_code,
        })
    }

    /// Record how a running unit ended.
    pub fn finish(
        &mut self,
        unit: &str,
        status: UnitStatus,
        exit_code: Option<i32>,
        output_tail: Vec<String>,
    ) -> Option<LifecycleEvent> {
        let info = self.units.get_mut(unit)?;
        info.record.exit_code = exit_code;
        info.record.output_tail = output_tail;
        self.transition(unit, status)
    }

    /// Cancel every pending descendant of a failed unit.
    pub fn cancel_descendants(&mut self, failed: &str) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for name in descendants_of(self.graph, failed) {
            let pending = self
                .units
                .get(&name)
                .is_some_and(|i| i.status() == UnitStatus::Pending);
            if !pending {
                continue;
            }
            debug!(unit = %name, upstream = %failed, "canceling dependent of failed unit");
            events.extend(self.transition(&name, UnitStatus::Canceled));
        }
        events
    }

    /// Cancel every unit that has not started yet, in order.
    pub fn cancel_all_pending(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for name in self.order {
            let pending = self
                .units
                .get(name)
                .is_some_and(|i| i.status() == UnitStatus::Pending);
            if pending {
                events.extend(self.transition(name, UnitStatus::Canceled));
            }
        }
        events
    }

    /// Mark up to `slots` ready units as running, lowest position first.
    pub fn collect_new_ready_units(
        &mut self,
        slots: usize,
    ) -> (Vec<ScheduledUnit>, Vec<LifecycleEvent>) {
        let candidates: Vec<UnitPath> = self
            .order
            .iter()
            .filter(|name| {
                self.units.get(name.as_str()).is_some_and(|info| {
                    info.status() == UnitStatus::Pending && self.deps_satisfied_for_info(info)
                })
            })
            .take(slots)
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        let mut events = Vec::with_capacity(candidates.len());

        for name in candidates {
            if let Some(event) = self.transition(&name, UnitStatus::Running) {
                events.push(event);
            }
            if let Some(info) = self.units.get(&name) {
                info!(unit = %info.path, position = info.position, "starting unit");
                ready.push(ScheduledUnit::from_unit_info(info));
            }
        }

        (ready, events)
    }
}

/// Dependency checks over a shared borrow of the unit map.
pub struct ReadOnlyStateManager<'a> {
    units: &'a HashMap<UnitPath, UnitInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(units: &'a HashMap<UnitPath, UnitInfo>) -> Self {
        Self { units }
    }

    /// A unit may start once every predecessor is terminal.
    ///
    /// A failed predecessor only counts as terminal here; with stop-on-failure
    /// its dependents were already canceled.
    pub fn deps_satisfied_for_info(&self, info: &UnitInfo) -> bool {
        info.deps.iter().all(|dep| match self.units.get(dep) {
            Some(d) => d.status().is_terminal(),
            None => {
                warn!(unit = %info.path, dep = %dep, "dependency missing from unit map");
                false
            }
        })
    }
}
