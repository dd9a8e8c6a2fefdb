// src/exec/executor_loop.rs

//! Background loop that starts a runner per scheduled unit.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelContext;
use crate::dag::ScheduledUnit;
use crate::engine::RuntimeEvent;
use crate::exec::unit_runner::run_unit;
use crate::exec::ExecSpec;

/// Spawn the background executor loop.
///
/// The returned sender is what `ProcessBackend` forwards scheduled units to.
/// Each unit runs in its own Tokio task; the scheduler never dispatches a
/// unit twice, so a second request for a live unit is dropped with a warning.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    spec: Arc<ExecSpec>,
    cancel: CancelContext,
) -> mpsc::Sender<ScheduledUnit> {
    let (tx, mut rx) = mpsc::channel::<ScheduledUnit>(32);

    tokio::spawn(async move {
        info!(jobs = spec.jobs.len(), "executor loop started");

        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(unit) = rx.recv().await {
            active.retain(|_, handle| !handle.is_finished());

            if active.contains_key(&unit.path) {
                warn!(unit = %unit.path, "unit already running; ignoring duplicate dispatch");
                continue;
            }

            let name = unit.path.clone();
            let spec = Arc::clone(&spec);
            let rt_tx = runtime_tx.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                let path = unit.path.clone();
                run_unit(unit, spec, rt_tx, cancel).await;
                debug!(unit = %path, "unit runner finished");
            });
            active.insert(name, handle);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}
