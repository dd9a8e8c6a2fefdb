// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs each scheduled unit's job sequence with `tokio::process::Command`
//! and reports back to the runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ExecutorBackend` trait, the production
//!   `ProcessBackend` and the spawn-free `DryRunBackend`.
//! - [`executor_loop`] owns the background loop that starts unit runners.
//! - [`unit_runner`] runs one unit's jobs in order.
//! - [`signal`] delivers interrupts to a job's process group.

pub mod backend;
pub mod executor_loop;
pub mod signal;
pub mod unit_runner;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use backend::{DryRunBackend, ExecutorBackend, ProcessBackend};
pub use executor_loop::spawn_executor;

/// One job: program plus arguments.
pub type Job = Vec<String>;

/// Number of stderr lines kept per unit.
pub const OUTPUT_TAIL_LINES: usize = 20;

/// What every unit of an invocation runs, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecSpec {
    /// Project root; unit paths are resolved against it.
    pub root: PathBuf,
    pub jobs: Vec<Job>,
    /// Added to every job, below the unit's own env.
    pub env: BTreeMap<String, String>,
}

impl ExecSpec {
    pub fn new(root: impl Into<PathBuf>, jobs: Vec<Job>) -> Self {
        Self {
            root: root.into(),
            jobs,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Directory a unit's jobs run in.
    pub fn workdir(&self, unit: &str) -> PathBuf {
        unit_dir(&self.root, unit)
    }
}

pub fn unit_dir(root: &Path, unit: &str) -> PathBuf {
    let rel = unit.trim_start_matches('/');
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}
