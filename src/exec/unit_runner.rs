// src/exec/unit_runner.rs

//! Runs one unit: its jobs in order, in the unit's directory.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelContext, Escalation};
use crate::dag::ScheduledUnit;
use crate::engine::{RuntimeEvent, UnitOutcome};
use crate::exec::signal::{escalate, isolate, ProcessGroup};
use crate::exec::{ExecSpec, Job, OUTPUT_TAIL_LINES};

/// Run a unit's jobs and always send exactly one `UnitCompleted`.
///
/// Setup errors (missing directory, unknown program) fail the unit with
/// exit code `-1`; the error text becomes its output tail.
pub async fn run_unit(
    unit: ScheduledUnit,
    spec: Arc<ExecSpec>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel: CancelContext,
) {
    let path = unit.path.clone();
    let (outcome, output_tail) = match run_unit_inner(&unit, &spec, &cancel).await {
        Ok(done) => done,
        Err(err) => {
            error!(unit = %path, error = %err, "unit execution error");
            (UnitOutcome::Failed(-1), vec![format!("{err:#}")])
        }
    };

    if let Err(e) = runtime_tx
        .send(RuntimeEvent::UnitCompleted {
            unit: path.clone(),
            outcome,
            output_tail,
        })
        .await
    {
        warn!(unit = %path, error = %e, "runtime gone; dropping completion");
    }
}

async fn run_unit_inner(
    unit: &ScheduledUnit,
    spec: &ExecSpec,
    cancel: &CancelContext,
) -> Result<(UnitOutcome, Vec<String>)> {
    let mut tail = Vec::new();

    for (n, job) in spec.jobs.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(unit = %unit.path, skipped = spec.jobs.len() - n, "interrupted; skipping remaining jobs");
            return Ok((UnitOutcome::Canceled, tail));
        }

        let exit = run_job(unit, spec, job, cancel).await?;
        tail = exit.tail;

        if exit.killed_leftovers {
            info!(unit = %unit.path, "leftover job processes killed by interrupt");
            return Ok((UnitOutcome::Canceled, tail));
        }

        if exit.status.success() {
            continue;
        }

        if exited_by_signal(&exit.status) && cancel.is_cancelled() {
            info!(unit = %unit.path, "job stopped by interrupt");
            return Ok((UnitOutcome::Canceled, tail));
        }

        let code = exit_code(&exit.status);
        warn!(unit = %unit.path, job = n, exit_code = code, "job failed; skipping remaining jobs");
        return Ok((UnitOutcome::Failed(code), tail));
    }

    Ok((UnitOutcome::Success, tail))
}

struct JobExit {
    status: ExitStatus,
    tail: Vec<String>,
    /// Processes outlived the leader and had to be killed.
    killed_leftovers: bool,
}

async fn run_job(
    unit: &ScheduledUnit,
    spec: &ExecSpec,
    job: &Job,
    cancel: &CancelContext,
) -> Result<JobExit> {
    let (program, args) = job
        .split_first()
        .with_context(|| format!("empty job for unit '{}'", unit.path))?;
    let dir = spec.workdir(&unit.path);

    info!(unit = %unit.path, cmd = %job.join(" "), dir = %dir.display(), "starting job");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&dir)
        .envs(&spec.env)
        .envs(&unit.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate(&mut cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{program}' in {} for unit '{}'", dir.display(), unit.path))?;
    let group = ProcessGroup::of(&child);

    let stdout = child.stdout.take().map(|out| forward_stdout(unit.path.clone(), out));
    let stderr = child.stderr.take().map(|err| collect_stderr(unit.path.clone(), err));

    // Interrupts that arrive while the job runs are forwarded to its group.
    let mut cancel_rx = cancel.subscribe();
    let already = Escalation::from_count(*cancel_rx.borrow_and_update());
    if already != Escalation::None {
        if let Err(e) = escalate(&mut child, group, already) {
            warn!(unit = %unit.path, error = %e, "failed to signal job");
        }
    }

    let mut watching = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.with_context(|| format!("waiting for job of unit '{}'", unit.path))?;
            }
            changed = cancel_rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let level = Escalation::from_count(*cancel_rx.borrow_and_update());
                debug!(unit = %unit.path, ?level, "forwarding interrupt to job");
                if let Err(e) = escalate(&mut child, group, level) {
                    warn!(unit = %unit.path, error = %e, "failed to signal job");
                }
            }
        }
    };

    info!(
        unit = %unit.path,
        exit_code = status.code(),
        success = status.success(),
        "job exited"
    );

    // Background processes of the group may still hold the pipes; the job is
    // not done until they are gone, and interrupts still apply to them.
    let drain = async move {
        if let Some(handle) = stdout {
            let _ = handle.await;
        }
        match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        }
    };
    tokio::pin!(drain);

    let mut killed_leftovers = false;
    let tail = loop {
        tokio::select! {
            tail = &mut drain => break tail,
            changed = cancel_rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let level = Escalation::from_count(*cancel_rx.borrow_and_update());
                debug!(unit = %unit.path, ?level, "forwarding interrupt to leftover job processes");
                if let Err(e) = group.signal(level) {
                    warn!(unit = %unit.path, error = %e, "failed to signal job");
                }
                killed_leftovers |= level == Escalation::Kill;
            }
        }
    };

    Ok(JobExit {
        status,
        tail,
        killed_leftovers,
    })
}

/// Unit output goes to stdout, prefixed so parallel units stay readable.
fn forward_stdout<R>(unit: String, out: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(out).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            println!("{unit}: {line}");
        }
    })
}

/// Echo stderr and keep its last lines.
fn collect_stderr<R>(unit: String, err: R) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
        let mut lines = BufReader::new(err).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            eprintln!("{unit}: {line}");
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect()
    })
}

#[cfg(unix)]
fn exited_by_signal(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn exited_by_signal(status: &ExitStatus) -> bool {
    status.code().is_none()
}

/// Shell convention: death by signal N reports `128 + N`.
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    -1
}
