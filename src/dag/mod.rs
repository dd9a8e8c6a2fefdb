// src/dag/mod.rs

//! Ordering graph and scheduling.
//!
//! - [`graph`] builds the ordering graph from `after` / `before` clauses and
//!   directory nesting.
//! - [`order`] validates acyclicity and derives the deterministic order.
//! - [`scheduler`] is the per-invocation state machine deciding which units
//!   may start.
//! - [`unit_info`] holds per-unit records and the scheduled-unit type.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies per-unit state transitions.

pub mod graph;
pub mod order;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod unit_info;

pub use graph::{DagGraph, EdgeKind, GraphDescription};
pub use order::{check_acyclic, descendants_of, find_cycle, topological_order};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use scheduler_step::SchedulerStep;
pub use unit_info::{ExecutionRecord, RunSummary, ScheduledUnit};
