// src/select/expand.rs

//! Selection expansion through `wants` / `wanted_by`.
//!
//! These clauses never order anything; they only pull more units into the
//! run. The pull relation lives in its own adjacency list over a dense index
//! arena (`X wants Y` => X pulls Y, `Y wanted_by X` => X pulls Y) and is
//! walked transitively from every root. Cycles are legal here: they are
//! recorded as soft cycles and reported once.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::catalog::{CatalogIndex, Clause, Resolution, Unit, UnitPath};
use crate::diagnostics::Diagnostics;
use crate::errors::{Result, StackdagError};

/// Final selection set plus what expansion found along the way.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Every selected unit, sorted by path.
    pub selected: Vec<UnitPath>,
    /// Units that were not roots and got pulled in, sorted by path.
    pub pulled: Vec<UnitPath>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Adjacency over arena indices; `pulls[i]` is sorted and deduplicated.
struct PullGraph<'a> {
    paths: Vec<&'a str>,
    pulls: Vec<Vec<usize>>,
}

impl<'a> PullGraph<'a> {
    fn build(index: &CatalogIndex<'a>, diags: &mut Diagnostics) -> Self {
        let paths: Vec<&'a str> = index.units().map(|u| u.path.as_str()).collect();
        let pos: HashMap<&str, usize> = paths.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); paths.len()];

        for unit in index.units() {
            let me = pos[unit.path.as_str()];
            for clause in [Clause::Wants, Clause::WantedBy] {
                for entry in unit.clause(clause) {
                    match index.resolve(unit, entry) {
                        Resolution::Units(targets) => {
                            for target in targets {
                                let other = pos[target];
                                match clause {
                                    Clause::Wants => sets[me].insert(other),
                                    _ => sets[other].insert(me),
                                };
                            }
                        }
                        Resolution::Invalid(reason) => {
                            diags.invalid_reference(&unit.path, clause, entry, reason);
                        }
                    }
                }
            }
        }

        let pulls = sets.into_iter().map(|s| s.into_iter().collect()).collect();
        Self { paths, pulls }
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.paths.binary_search(&path).ok()
    }

    /// Rotate a cycle so its smallest path comes first, closing it again.
    fn canonical_cycle(&self, nodes: &[usize]) -> Vec<UnitPath> {
        let start = nodes
            .iter()
            .enumerate()
            .min_by_key(|(_, n)| self.paths[**n])
            .map(|(i, _)| i)
            .unwrap_or(0);

        let mut chain: Vec<UnitPath> = nodes[start..]
            .iter()
            .chain(&nodes[..start])
            .map(|n| self.paths[*n].to_string())
            .collect();
        if let Some(first) = chain.first().cloned() {
            chain.push(first);
        }
        chain
    }
}

/// Expand `roots` through the catalog's `wants` / `wanted_by` clauses.
///
/// Fails with [`StackdagError::FilterNotAllowed`] if any catalog unit uses a
/// `tag:` query in those clauses. Tag filters are not re-applied to pulled
/// units.
pub fn expand_selection(units: &[Unit], roots: &[UnitPath]) -> Result<Expansion> {
    for unit in units {
        unit.check_selection_clauses()?;
    }

    let index = CatalogIndex::new(units);
    let mut diagnostics = Diagnostics::new();
    let graph = PullGraph::build(&index, &mut diagnostics);

    let mut color = vec![Color::Unvisited; graph.paths.len()];

    for root in roots {
        let start = graph
            .position(root)
            .ok_or_else(|| StackdagError::UnitNotFound(root.clone()))?;
        if color[start] != Color::Unvisited {
            continue;
        }

        // Iterative DFS; `stack` is also the current path.
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        color[start] = Color::InProgress;

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            top.1 += 1;

            if let Some(&child) = graph.pulls[node].get(next) {
                match color[child] {
                    Color::Unvisited => {
                        color[child] = Color::InProgress;
                        stack.push((child, 0));
                    }
                    Color::InProgress => {
                        let from = stack
                            .iter()
                            .position(|(n, _)| *n == child)
                            .unwrap_or(0);
                        let nodes: Vec<usize> = stack[from..].iter().map(|(n, _)| *n).collect();
                        diagnostics.selection_cycle(graph.canonical_cycle(&nodes));
                    }
                    Color::Done => {}
                }
            } else {
                color[node] = Color::Done;
                stack.pop();
            }
        }
    }

    let root_set: BTreeSet<&str> = roots.iter().map(|r| r.as_str()).collect();
    let selected: Vec<UnitPath> = graph
        .paths
        .iter()
        .zip(&color)
        .filter(|(_, c)| **c == Color::Done)
        .map(|(p, _)| p.to_string())
        .collect();
    let pulled: Vec<UnitPath> = selected
        .iter()
        .filter(|p| !root_set.contains(p.as_str()))
        .cloned()
        .collect();

    debug!(
        roots = roots.len(),
        pulled = pulled.len(),
        "expanded selection through wants/wanted_by"
    );

    Ok(Expansion {
        selected,
        pulled,
        diagnostics,
    })
}
