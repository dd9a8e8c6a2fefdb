use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use stackdag::dag::ScheduledUnit;
use stackdag::engine::{RuntimeEvent, UnitOutcome};
use stackdag::errors::Result;
use stackdag::exec::ExecutorBackend;

/// A fake executor that:
/// - records which units were "run", in dispatch order
/// - immediately reports a scripted outcome (default `Success`) for each.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    outcomes: HashMap<String, UnitOutcome>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            outcomes: HashMap::new(),
        }
    }

    /// Make `unit` end with `outcome` instead of success.
    pub fn with_outcome(mut self, unit: &str, outcome: UnitOutcome) -> Self {
        self.outcomes.insert(unit.to_string(), outcome);
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let outcomes = self.outcomes.clone();

        Box::pin(async move {
            for u in units {
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(u.path.clone());
                }

                let outcome = outcomes.get(&u.path).copied().unwrap_or(UnitOutcome::Success);
                tx.send(RuntimeEvent::UnitCompleted {
                    unit: u.path.clone(),
                    outcome,
                    output_tail: Vec::new(),
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Shared view into a [`ControllableExecutor`] for the test body.
#[derive(Clone, Default)]
pub struct ControlHandle {
    started: Arc<Mutex<Vec<String>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<UnitOutcome>>>>,
}

impl ControlHandle {
    /// Units started so far, in dispatch order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    /// Units started and not yet released.
    pub fn in_flight(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pending.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Let a started unit finish. Returns false if it is not in flight.
    pub fn release(&self, unit: &str, outcome: UnitOutcome) -> bool {
        match self.pending.lock().unwrap().remove(unit) {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Poll until at least `n` units have started (panics after 5 s).
    pub async fn wait_for_started(&self, n: usize) -> Vec<String> {
        for _ in 0..500 {
            let started = self.started();
            if started.len() >= n {
                return started;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {n} started units; got {:?}", self.started());
    }
}

/// A fake executor whose units only finish when the test releases them.
pub struct ControllableExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    handle: ControlHandle,
}

impl ControllableExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            handle: ControlHandle::default(),
        }
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }
}

impl ExecutorBackend for ControllableExecutor {
    fn spawn_ready_units(
        &mut self,
        units: Vec<ScheduledUnit>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for u in units {
            let (done_tx, done_rx) = oneshot::channel();
            self.handle
                .pending
                .lock()
                .unwrap()
                .insert(u.path.clone(), done_tx);
            self.handle.started.lock().unwrap().push(u.path.clone());

            // Spawn a background task so we don't block the runtime loop.
            let tx = self.runtime_tx.clone();
            tokio::spawn(async move {
                let outcome = done_rx.await.unwrap_or(UnitOutcome::Canceled);
                let _ = tx
                    .send(RuntimeEvent::UnitCompleted {
                        unit: u.path,
                        outcome,
                        output_tail: Vec::new(),
                    })
                    .await;
            });
        }

        Box::pin(async { Ok(()) })
    }
}
