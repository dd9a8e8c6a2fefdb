// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning processes
//! itself.
//!
//! - `ProcessBackend` is the production implementation. It wraps the
//!   background loop from [`spawn_executor`] and forwards scheduled units
//!   over an mpsc channel.
//! - `DryRunBackend` spawns nothing and reports every unit as successful.
//! - Tests provide their own backend with scripted outcomes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::cancel::CancelContext;
use crate::dag::ScheduledUnit;
use crate::engine::{RuntimeEvent, UnitOutcome};
use crate::errors::{Error, Result};
use crate::exec::executor_loop::spawn_executor;
use crate::exec::ExecSpec;

/// Trait abstracting how scheduled units are executed.
///
/// Implementations must eventually send one `RuntimeEvent::UnitCompleted`
/// per dispatched unit, or the runtime waits forever.
pub trait ExecutorBackend: Send {
    fn spawn_ready_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

pub struct ProcessBackend {
    tx: mpsc::Sender<ScheduledUnit>,
}

impl ProcessBackend {
    /// Starts the background executor loop immediately.
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        spec: ExecSpec,
        cancel: CancelContext,
    ) -> Self {
        let tx = spawn_executor(runtime_tx, Arc::new(spec), cancel);
        Self { tx }
    }
}

impl ExecutorBackend for ProcessBackend {
    fn spawn_ready_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for unit in units {
                tx.send(unit).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}

/// Walks the plan without running anything.
pub struct DryRunBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    spec: ExecSpec,
}

impl DryRunBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, spec: ExecSpec) -> Self {
        Self { runtime_tx, spec }
    }
}

impl ExecutorBackend for DryRunBackend {
    fn spawn_ready_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let spec = &self.spec;

        Box::pin(async move {
            for unit in units {
                for job in &spec.jobs {
                    info!(
                        unit = %unit.path,
                        dir = %spec.workdir(&unit.path).display(),
                        cmd = %job.join(" "),
                        "dry run: would run job"
                    );
                }
                tx.send(RuntimeEvent::UnitCompleted {
                    unit: unit.path,
                    outcome: UnitOutcome::Success,
                    output_tail: Vec::new(),
                })
                .await
                .map_err(Error::from)?;
            }
            Ok(())
        })
    }
}
