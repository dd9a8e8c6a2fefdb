// src/catalog/mod.rs

//! Unit catalog model and the collaborator traits the core consumes.
//!
//! - [`Unit`] is the immutable description of one stack.
//! - [`UnitCatalog`] lists units; the TOML config implements it, tests
//!   usually hand in a `Vec<Unit>`.
//! - [`ChangeDetector`] optionally narrows the root selection to changed
//!   units.
//! - [`index::CatalogIndex`] resolves clause entries to unit paths.

pub mod index;
pub mod path;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::errors::{Result, StackdagError};
use crate::types::OrderRef;

pub use index::{CatalogIndex, Resolution};

/// Canonical unit identity: normalized project path.
pub type UnitPath = String;

/// The four ordering/selection clauses a unit may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    After,
    Before,
    Wants,
    WantedBy,
}

impl Clause {
    pub fn as_str(self) -> &'static str {
        match self {
            Clause::After => "after",
            Clause::Before => "before",
            Clause::Wants => "wants",
            Clause::WantedBy => "wanted_by",
        }
    }

    /// Only ordering clauses accept `tag:` queries.
    pub fn allows_tag_queries(self) -> bool {
        matches!(self, Clause::After | Clause::Before)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered unit of work (a stack).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unit {
    pub path: UnitPath,
    pub id: Option<String>,
    pub tags: BTreeSet<String>,
    pub after: Vec<OrderRef>,
    pub before: Vec<OrderRef>,
    pub wants: Vec<OrderRef>,
    pub wanted_by: Vec<OrderRef>,
    /// Extra environment for every process spawned in this unit.
    pub env: BTreeMap<String, String>,
}

impl Unit {
    pub fn new(path: impl Into<UnitPath>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn clause(&self, clause: Clause) -> &[OrderRef] {
        match clause {
            Clause::After => &self.after,
            Clause::Before => &self.before,
            Clause::Wants => &self.wants,
            Clause::WantedBy => &self.wanted_by,
        }
    }

    /// Reject `tag:` queries in `wants` / `wanted_by`.
    pub fn check_selection_clauses(&self) -> Result<()> {
        let clauses = [Clause::After, Clause::Before, Clause::Wants, Clause::WantedBy];
        for clause in clauses.into_iter().filter(|c| !c.allows_tag_queries()) {
            if let Some(entry) = self.clause(clause).iter().find(|e| e.is_tag_query()) {
                return Err(StackdagError::FilterNotAllowed {
                    unit: self.path.clone(),
                    clause: clause.to_string(),
                    entry: entry.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Source of units for one invocation.
pub trait UnitCatalog {
    fn list_units(&self) -> Vec<Unit>;
}

impl UnitCatalog for Vec<Unit> {
    fn list_units(&self) -> Vec<Unit> {
        self.clone()
    }
}

impl UnitCatalog for [Unit] {
    fn list_units(&self) -> Vec<Unit> {
        self.to_vec()
    }
}

/// Optional restriction of the root selection to changed units.
pub trait ChangeDetector {
    fn changed_unit_paths(&self) -> Result<HashSet<UnitPath>>;
}

/// Reads changed unit paths from a file, one per line.
///
/// This is the hand-off point for an external git change detector. Blank
/// lines and `#` comments are skipped; relative lines are project-rooted.
#[derive(Debug, Clone)]
pub struct ChangedPathsFile {
    path: PathBuf,
}

impl ChangedPathsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangeDetector for ChangedPathsFile {
    fn changed_unit_paths(&self) -> Result<HashSet<UnitPath>> {
        let contents = fs::read_to_string(&self.path)?;
        let mut changed = HashSet::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let normalized = path::normalize("/", line).ok_or_else(|| {
                StackdagError::ConfigError(format!(
                    "changed path {line:?} in {:?} escapes the project root",
                    self.path
                ))
            })?;
            changed.insert(normalized);
        }

        Ok(changed)
    }
}
