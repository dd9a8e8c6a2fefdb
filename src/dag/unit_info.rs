// src/dag/unit_info.rs

//! Per-unit execution state and the types handed to the executor.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::UnitPath;
use crate::types::UnitStatus;

/// What happened to one unit in one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Last lines of stderr.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_tail: Vec<String>,
}

impl Default for ExecutionRecord {
    fn default() -> Self {
        Self {
            status: UnitStatus::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
            output_tail: Vec::new(),
        }
    }
}

/// Static unit information plus its record for the current invocation.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub path: UnitPath,
    /// Position in the reported order; lower runs first when slots are scarce.
    pub position: usize,
    /// Direct predecessors inside the selection.
    pub deps: Vec<UnitPath>,
    pub env: BTreeMap<String, String>,
    pub record: ExecutionRecord,
}

impl UnitInfo {
    pub fn status(&self) -> UnitStatus {
        self.record.status
    }
}

/// A unit the scheduler wants the executor to start now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnit {
    pub path: UnitPath,
    pub position: usize,
    /// Unit-level environment, layered over the global one by the backend.
    pub env: BTreeMap<String, String>,
}

impl ScheduledUnit {
    pub fn from_unit_info(info: &UnitInfo) -> Self {
        Self {
            path: info.path.clone(),
            position: info.position,
            env: info.env.clone(),
        }
    }
}

/// Final per-unit records, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub units: Vec<(UnitPath, ExecutionRecord)>,
}

impl RunSummary {
    /// Zero-unit runs succeed.
    pub fn is_success(&self) -> bool {
        self.units.iter().all(|(_, r)| r.status == UnitStatus::Ok)
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|(_, r)| r.status == status).count()
    }

    pub fn status_of(&self, unit: &str) -> Option<UnitStatus> {
        self.record_of(unit).map(|r| r.status)
    }

    pub fn record_of(&self, unit: &str) -> Option<&ExecutionRecord> {
        self.units.iter().find(|(p, _)| p == unit).map(|(_, r)| r)
    }

    /// Process exit code for the whole invocation.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}
