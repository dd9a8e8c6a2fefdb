// src/diagnostics.rs

//! Non-fatal findings collected while planning.
//!
//! Planning never warns inline: invalid references and soft selection cycles
//! are gathered here and surfaced once, grouped, by [`Diagnostics::emit`].

use std::collections::BTreeSet;
use std::fmt;

use tracing::warn;

use crate::catalog::{Clause, UnitPath};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Warning {
    /// A clause entry resolved to nothing; its edge was skipped.
    InvalidReference {
        unit: UnitPath,
        clause: &'static str,
        reference: String,
        reason: String,
    },
    /// `wants` / `wanted_by` form a cycle. Each chain repeats its first node
    /// at the end.
    SelectionCycle(Vec<UnitPath>),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InvalidReference {
                unit,
                clause,
                reference,
                reason,
            } => write!(
                f,
                "unit {unit}: {clause} entry {reference:?} ignored ({reason})"
            ),
            Warning::SelectionCycle(chain) => write!(f, "{}", chain.join(" -> ")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: BTreeSet<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalid_reference(
        &mut self,
        unit: &str,
        clause: Clause,
        reference: impl ToString,
        reason: impl Into<String>,
    ) {
        self.warnings.insert(Warning::InvalidReference {
            unit: unit.to_string(),
            clause: clause.as_str(),
            reference: reference.to_string(),
            reason: reason.into(),
        });
    }

    pub fn selection_cycle(&mut self, chain: Vec<UnitPath>) {
        self.warnings.insert(Warning::SelectionCycle(chain));
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    pub fn selection_cycles(&self) -> Vec<&[UnitPath]> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                Warning::SelectionCycle(chain) => Some(chain.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Log every collected warning, one grouped message per kind.
    pub fn emit(&self) {
        let invalid: Vec<String> = self
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::InvalidReference { .. }))
            .map(|w| w.to_string())
            .collect();

        if !invalid.is_empty() {
            warn!(
                count = invalid.len(),
                details = %invalid.join("; "),
                "ordering/selection clauses reference missing paths; entries ignored"
            );
        }

        let cycles: Vec<String> = self
            .selection_cycles()
            .iter()
            .map(|chain| chain.join(" -> "))
            .collect();

        if !cycles.is_empty() {
            warn!(
                count = cycles.len(),
                cycles = %cycles.join("; "),
                "stack selection clauses (wants/wanted_by) have cycles"
            );
        }
    }
}
