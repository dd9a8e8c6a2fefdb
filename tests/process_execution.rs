// tests/process_execution.rs
#![cfg(unix)]

mod common;
use crate::common::builders::{catalog, env, UnitBuilder};
use crate::common::{init_tracing, options, plan};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use stackdag::cancel::CancelContext;
use stackdag::dag::{RunSummary, SchedulerOptions};
use stackdag::drive;
use stackdag::engine::RuntimeEvent;
use stackdag::events::{ChannelSink, EventEmitter};
use stackdag::exec::{ExecSpec, Job, ProcessBackend};
use stackdag::plan::Plan;
use stackdag::types::UnitStatus;
use stackdag_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

fn sh(script: &str) -> Job {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn make_dirs(root: &Path, units: &[&str]) -> std::io::Result<()> {
    for unit in units {
        fs::create_dir_all(root.join(unit.trim_start_matches('/')))?;
    }
    Ok(())
}

async fn run(
    plan: &Plan,
    options: SchedulerOptions,
    spec: ExecSpec,
    cancel: CancelContext,
) -> Result<RunSummary, Box<dyn Error>> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = ProcessBackend::new(rt_tx, spec, cancel.clone());
    let summary = with_timeout(drive(
        plan,
        options,
        rt_rx,
        backend,
        EventEmitter::new(),
        cancel,
    ))
    .await?;
    Ok(summary)
}

#[tokio::test]
async fn jobs_run_in_unit_dirs_with_merged_env() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/a", "/b"])?;

    let units = catalog([
        UnitBuilder::new("/a").env("NAME", "a"),
        UnitBuilder::new("/b").after("/a").env("NAME", "b").env("GREETING", "yo"),
    ]);
    let spec = ExecSpec::new(dir.path(), vec![sh("echo \"$GREETING-$NAME\" > out.txt")])
        .with_env(env(&[("GREETING", "hi")]));

    let summary = run(&plan(&units), options(2, false), spec, CancelContext::new()).await?;

    assert!(summary.is_success());
    assert_eq!(fs::read_to_string(dir.path().join("a/out.txt"))?, "hi-a\n");
    assert_eq!(fs::read_to_string(dir.path().join("b/out.txt"))?, "yo-b\n");
    Ok(())
}

#[tokio::test]
async fn failing_job_stops_the_unit_and_cancels_dependents() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/a", "/b"])?;

    let units = catalog([UnitBuilder::new("/a"), UnitBuilder::new("/b").after("/a")]);
    let spec = ExecSpec::new(
        dir.path(),
        vec![sh("echo boom >&2; exit 7"), sh("touch second")],
    );

    let summary = run(&plan(&units), options(1, false), spec, CancelContext::new()).await?;

    let record = summary.record_of("/a").ok_or("missing /a")?;
    assert_eq!(record.status, UnitStatus::Failed);
    assert_eq!(record.exit_code, Some(7));
    assert_eq!(record.output_tail, vec!["boom"]);
    assert!(!dir.path().join("a/second").exists());

    assert_eq!(summary.status_of("/b"), Some(UnitStatus::Canceled));
    assert!(!dir.path().join("b/second").exists());
    assert_eq!(summary.exit_code(), 1);
    Ok(())
}

#[tokio::test]
async fn stderr_tail_is_bounded() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/noisy"])?;

    let units = catalog([UnitBuilder::new("/noisy")]);
    let spec = ExecSpec::new(
        dir.path(),
        vec![sh("i=0; while [ $i -lt 30 ]; do echo line$i >&2; i=$((i+1)); done; exit 1")],
    );

    let summary = run(&plan(&units), options(1, false), spec, CancelContext::new()).await?;

    let record = summary.record_of("/noisy").ok_or("missing /noisy")?;
    assert_eq!(record.output_tail.len(), 20);
    assert_eq!(record.output_tail.first().map(String::as_str), Some("line10"));
    assert_eq!(record.output_tail.last().map(String::as_str), Some("line29"));
    Ok(())
}

#[tokio::test]
async fn missing_unit_directory_fails_the_unit() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let units = catalog([UnitBuilder::new("/ghost")]);
    let spec = ExecSpec::new(dir.path(), vec![sh("true")]);

    let summary = run(&plan(&units), options(1, false), spec, CancelContext::new()).await?;

    let record = summary.record_of("/ghost").ok_or("missing /ghost")?;
    assert_eq!(record.status, UnitStatus::Failed);
    assert_eq!(record.exit_code, Some(-1));
    assert!(!record.output_tail.is_empty());
    Ok(())
}

#[tokio::test]
async fn death_by_signal_reports_shell_exit_code() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/a"])?;

    let units = catalog([UnitBuilder::new("/a")]);
    let spec = ExecSpec::new(dir.path(), vec![sh("kill -TERM $$")]);

    let summary = run(&plan(&units), options(1, false), spec, CancelContext::new()).await?;

    let record = summary.record_of("/a").ok_or("missing /a")?;
    assert_eq!(record.status, UnitStatus::Failed);
    assert_eq!(record.exit_code, Some(128 + 15));
    Ok(())
}

#[tokio::test]
async fn interrupts_stop_running_jobs() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/slow", "/later"])?;

    let units = catalog([
        UnitBuilder::new("/slow"),
        UnitBuilder::new("/later").after("/slow"),
    ]);
    let spec = ExecSpec::new(
        dir.path(),
        vec![vec!["sleep".to_string(), "30".to_string()], sh("touch done")],
    );
    let plan = plan(&units);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (sink, mut events) = ChannelSink::channel();
    let cancel = CancelContext::new();
    let backend = ProcessBackend::new(rt_tx, spec, cancel.clone());

    let runtime_cancel = cancel.clone();
    let runtime = tokio::spawn(async move {
        drive(
            &plan,
            options(1, false),
            rt_rx,
            backend,
            EventEmitter::new().with_sink(sink),
            runtime_cancel,
        )
        .await
    });

    with_timeout(async {
        while let Some(event) = events.recv().await {
            if event.unit == "/slow" && event.status == UnitStatus::Running {
                break;
            }
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Escalate all the way so the test does not depend on SIGINT disposition.
    cancel.interrupt();
    cancel.interrupt();
    cancel.interrupt();

    let summary = with_timeout(runtime).await??;
    assert_eq!(summary.status_of("/slow"), Some(UnitStatus::Canceled));
    assert_eq!(summary.status_of("/later"), Some(UnitStatus::Canceled));
    assert!(!dir.path().join("slow/done").exists());
    Ok(())
}

#[tokio::test]
async fn third_interrupt_kills_jobs_that_ignore_sigint() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/stubborn"])?;

    let units = catalog([UnitBuilder::new("/stubborn")]);
    let spec = ExecSpec::new(dir.path(), vec![sh("trap '' INT; sleep 30")]);
    let plan = plan(&units);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (sink, mut events) = ChannelSink::channel();
    let cancel = CancelContext::new();
    let backend = ProcessBackend::new(rt_tx, spec, cancel.clone());

    let runtime_cancel = cancel.clone();
    let runtime = tokio::spawn(async move {
        drive(
            &plan,
            options(1, false),
            rt_rx,
            backend,
            EventEmitter::new().with_sink(sink),
            runtime_cancel,
        )
        .await
    });

    with_timeout(async {
        while let Some(event) = events.recv().await {
            if event.status == UnitStatus::Running {
                break;
            }
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    cancel.interrupt();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!runtime.is_finished(), "job should survive a plain interrupt");

    cancel.interrupt();
    cancel.interrupt();

    let summary = with_timeout(runtime).await??;
    assert_eq!(summary.status_of("/stubborn"), Some(UnitStatus::Canceled));
    Ok(())
}

#[tokio::test]
async fn third_interrupt_kills_processes_left_behind_by_the_job() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    make_dirs(dir.path(), &["/detached", "/after"])?;

    let units = catalog([
        UnitBuilder::new("/detached"),
        UnitBuilder::new("/after").after("/detached"),
    ]);
    // The shell exits at once; the background sleep keeps the group and the
    // output pipes alive.
    let spec = ExecSpec::new(
        dir.path(),
        vec![sh("trap '' INT; sleep 30 & exit 0"), sh("touch done")],
    );
    let plan = plan(&units);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let (sink, mut events) = ChannelSink::channel();
    let cancel = CancelContext::new();
    let backend = ProcessBackend::new(rt_tx, spec, cancel.clone());

    let runtime_cancel = cancel.clone();
    let runtime = tokio::spawn(async move {
        drive(
            &plan,
            options(1, false),
            rt_rx,
            backend,
            EventEmitter::new().with_sink(sink),
            runtime_cancel,
        )
        .await
    });

    with_timeout(async {
        while let Some(event) = events.recv().await {
            if event.status == UnitStatus::Running {
                break;
            }
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    cancel.interrupt();
    cancel.interrupt();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!runtime.is_finished(), "leftover process ignores SIGINT");

    cancel.interrupt();

    let summary = with_timeout(runtime).await??;
    assert_eq!(summary.status_of("/detached"), Some(UnitStatus::Canceled));
    assert_eq!(summary.status_of("/after"), Some(UnitStatus::Canceled));
    assert!(!dir.path().join("detached/done").exists());
    Ok(())
}
