// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the scheduler (which units may start now)
//! - the event emitter (lifecycle transitions as they happen)
//! - the main runtime loop that reacts to:
//!   - unit completion events from the executor
//!   - interrupts from the cancel context
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::catalog::UnitPath;
use crate::cancel::Escalation;

/// How a unit's job sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Success,
    /// First non-zero exit code.
    Failed(i32),
    /// Stopped by an interrupt before finishing its jobs.
    Canceled,
}

/// Events flowing into the runtime from executors and the cancel context.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// All jobs of a unit are done (or were skipped).
    UnitCompleted {
        unit: UnitPath,
        outcome: UnitOutcome,
        /// Last lines of the unit's stderr.
        output_tail: Vec<String>,
    },
    /// The interrupt count changed.
    Interrupted(Escalation),
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
