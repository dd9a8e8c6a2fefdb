#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use stackdag::cancel::CancelContext;
use stackdag::catalog::Unit;
use stackdag::dag::{RunSummary, SchedulerOptions};
use stackdag::drive;
use stackdag::engine::RuntimeEvent;
use stackdag::events::{ChannelSink, EventEmitter, LifecycleEvent};
use stackdag::plan::{build_plan, Plan, PlanOptions};
use stackdag_test_utils::fake_executor::FakeExecutor;
use stackdag_test_utils::with_timeout;

pub use stackdag_test_utils::builders;
pub use stackdag_test_utils::init_tracing;

pub fn plan(units: &[Unit]) -> Plan {
    build_plan(units, &PlanOptions::default()).expect("plan should build")
}

pub fn options(max_running: usize, continue_on_error: bool) -> SchedulerOptions {
    SchedulerOptions {
        max_running,
        continue_on_error,
    }
}

/// Everything a fake-executor run produced.
pub struct FakeRun {
    pub summary: RunSummary,
    pub executed: Vec<String>,
    pub events: Vec<LifecycleEvent>,
}

/// Drive `plan` to completion with a `FakeExecutor` configured by `setup`.
pub async fn run_fake(
    plan: &Plan,
    options: SchedulerOptions,
    setup: impl FnOnce(FakeExecutor) -> FakeExecutor,
) -> FakeRun {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = setup(FakeExecutor::new(rt_tx, executed.clone()));

    let (sink, mut events_rx) = ChannelSink::channel();
    let emitter = EventEmitter::new().with_sink(sink);

    let summary = with_timeout(drive(
        plan,
        options,
        rt_rx,
        executor,
        emitter,
        CancelContext::new(),
    ))
    .await
    .expect("runtime should finish");

    let mut events = Vec::new();
    while let Ok(e) = events_rx.try_recv() {
        events.push(e);
    }

    let executed = executed.lock().unwrap().clone();
    FakeRun {
        summary,
        executed,
        events,
    }
}
