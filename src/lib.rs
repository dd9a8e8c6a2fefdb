// src/lib.rs

pub mod cancel;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod dag;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod select;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cancel::{spawn_signal_listener, CancelContext};
use crate::catalog::{ChangeDetector, ChangedPathsFile};
use crate::cli::{CliArgs, Command, ExecArgs, SelectionArgs};
use crate::config::{load_and_validate, project_root, ConfigFile};
use crate::dag::{RunSummary, Scheduler, SchedulerOptions};
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent};
use crate::errors::StackdagError;
use crate::events::{EventEmitter, JsonLinesSink, TracingSink};
use crate::exec::{DryRunBackend, ExecSpec, ExecutorBackend, Job, ProcessBackend};
use crate::plan::{build_plan, Plan, PlanOptions};
use crate::select::{Selector, TagFilter};
use crate::types::GraphFormat;

/// Minimum runtime event buffer; grows with the concurrency bound.
const EVENT_BUFFER: usize = 64;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - planning (selection, expansion, ordering)
/// - scheduler / runtime / executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let root = project_root(&args.config);

    match args.command {
        Command::List {
            selection,
            reverse,
            json,
        } => {
            let plan = plan_for(&cfg, &selection, reverse || cfg.config.reverse)?;
            if json {
                println!("{}", serde_json::to_string_pretty(plan.order())?);
            } else {
                for unit in plan.order() {
                    println!("{unit}");
                }
            }
            Ok(0)
        }
        Command::Graph { selection, format } => {
            let plan = plan_for(&cfg, &selection, false)?;
            match format {
                GraphFormat::Dot => print!("{}", plan.to_dot()),
                GraphFormat::Json => println!("{}", serde_json::to_string_pretty(&plan.describe())?),
            }
            Ok(0)
        }
        Command::Run {
            selection,
            exec,
            cmd,
        } => execute(&cfg, &root, &selection, &exec, vec![cmd]).await,
        Command::Script {
            selection,
            exec,
            name,
        } => {
            let script = cfg.script(&name).ok_or_else(|| {
                StackdagError::ConfigError(format!("unknown script '{name}'"))
            })?;
            execute(&cfg, &root, &selection, &exec, script.jobs.clone()).await
        }
    }
}

fn plan_for(cfg: &ConfigFile, selection: &SelectionArgs, reverse: bool) -> Result<Plan> {
    let mut selector = Selector::new(TagFilter::new(&selection.tags, &selection.no_tags)?);
    if let Some(scope) = &selection.scope {
        selector = selector.with_scope(scope)?;
    }
    if let Some(file) = &selection.changed_file {
        let changed = ChangedPathsFile::new(file)
            .changed_unit_paths()
            .with_context(|| format!("reading changed paths from {}", file.display()))?;
        debug!(changed = changed.len(), "restricting selection to changed units");
        selector = selector.with_restriction(changed);
    }

    let plan = build_plan(cfg, &PlanOptions { selector, reverse })?;
    Ok(plan)
}

async fn execute(
    cfg: &ConfigFile,
    root: &Path,
    selection: &SelectionArgs,
    exec: &ExecArgs,
    jobs: Vec<Job>,
) -> Result<i32> {
    let plan = plan_for(cfg, selection, exec.reverse || cfg.config.reverse)?;

    let options = SchedulerOptions {
        max_running: exec
            .parallel
            .map(|n| n as usize)
            .unwrap_or(cfg.config.parallel),
        continue_on_error: exec.continue_on_error || cfg.config.continue_on_error,
    };

    let mut emitter = EventEmitter::new().with_sink(TracingSink);
    if let Some(path) = &exec.events {
        let sink = JsonLinesSink::create(path)
            .with_context(|| format!("opening events file {}", path.display()))?;
        emitter.add_sink(Box::new(sink));
    }

    let spec = ExecSpec::new(root, jobs).with_env(cfg.env.clone());
    let cancel = CancelContext::new();
    let _signals = spawn_signal_listener(cancel.clone());

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_BUFFER.max(options.max_running * 2));

    info!(
        units = plan.order().len(),
        parallel = options.max_running,
        continue_on_error = options.continue_on_error,
        dry_run = exec.dry_run,
        "executing plan"
    );

    let summary = if exec.dry_run {
        let backend = DryRunBackend::new(rt_tx, spec);
        drive(&plan, options, rt_rx, backend, emitter, cancel).await?
    } else {
        let backend = ProcessBackend::new(rt_tx, spec, cancel.clone());
        drive(&plan, options, rt_rx, backend, emitter, cancel).await?
    };

    report(&summary);
    Ok(summary.exit_code())
}

/// Schedule `plan` on `backend` until every unit is terminal.
pub async fn drive<E: ExecutorBackend>(
    plan: &Plan,
    options: SchedulerOptions,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: E,
    emitter: EventEmitter,
    cancel: CancelContext,
) -> crate::errors::Result<RunSummary> {
    let core = CoreRuntime::new(Scheduler::from_plan(plan, options));
    Runtime::new(core, event_rx, backend, emitter, cancel)
        .run()
        .await
}

fn report(summary: &RunSummary) {
    use crate::types::UnitStatus;

    for (unit, record) in &summary.units {
        if record.status != UnitStatus::Failed {
            continue;
        }
        eprintln!(
            "stackdag: {unit} failed (exit code {})",
            record.exit_code.map_or("?".to_string(), |c| c.to_string())
        );
        for line in &record.output_tail {
            eprintln!("  | {line}");
        }
    }

    eprintln!(
        "stackdag: {} ok, {} failed, {} canceled",
        summary.count(UnitStatus::Ok),
        summary.count(UnitStatus::Failed),
        summary.count(UnitStatus::Canceled),
    );
}
