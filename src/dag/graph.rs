// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use petgraph::Direction;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::path::normalize;
use crate::catalog::{CatalogIndex, Clause, Resolution, Unit, UnitPath};
use crate::diagnostics::Diagnostics;
use crate::types::OrderRef;

/// Where an ordering edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// `after = [...]` on the target.
    After,
    /// `before = [...]` on the source.
    Before,
    /// A `tag:` query in either clause.
    Tag,
    /// The source directory contains the target.
    Nesting,
    /// Ordering that ran through units outside the selection.
    Indirect,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::After => "after",
            EdgeKind::Before => "before",
            EdgeKind::Tag => "tag",
            EdgeKind::Nesting => "nesting",
            EdgeKind::Indirect => "indirect",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDescription {
    pub from: UnitPath,
    pub to: UnitPath,
    pub kind: EdgeKind,
}

/// Serializable view of the ordering graph for display tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDescription {
    pub nodes: Vec<UnitPath>,
    pub edges: Vec<EdgeDescription>,
}

/// Ordering graph keyed by unit path.
///
/// An edge `a -> b` means *a reaches a terminal state before b starts*.
/// Nodes live in a dense petgraph arena, inserted in path order so every
/// iteration over the graph is deterministic. Edges are deduplicated; the
/// first kind recorded for a pair wins.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    graph: DiGraph<UnitPath, EdgeKind>,
    index: HashMap<UnitPath, NodeIndex>,
}

impl DagGraph {
    /// Build the ordering graph over the whole catalog.
    ///
    /// Unresolvable literal references are recorded in `diags` and skipped.
    /// A literal reference to the unit itself becomes a self-edge (and later
    /// a cycle); a unit matched by its own tag query or directory reference
    /// is skipped.
    pub fn build(units: &[Unit], diags: &mut Diagnostics) -> Self {
        let everything: Vec<UnitPath> = units.iter().map(|u| u.path.clone()).collect();
        Self::build_from(units, &everything, diags)
    }

    /// Like [`DagGraph::build`], but only warns about units reached by
    /// following `after` / `before` references from `start`.
    pub fn build_from(units: &[Unit], start: &[UnitPath], diags: &mut Diagnostics) -> Self {
        let catalog = CatalogIndex::new(units);
        let mut dag = DagGraph::default();
        let mut references: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut invalid = Vec::new();

        for unit in catalog.units() {
            dag.add_unit(&unit.path);
        }

        for unit in catalog.units() {
            for clause in [Clause::After, Clause::Before] {
                for entry in unit.clause(clause) {
                    let targets = match catalog.resolve(unit, entry) {
                        Resolution::Units(targets) => targets,
                        Resolution::Invalid(reason) => {
                            invalid.push((unit.path.as_str(), clause, entry, reason));
                            continue;
                        }
                    };

                    let literal_self = match entry {
                        OrderRef::Path(p) => {
                            normalize(&unit.path, p).as_deref() == Some(unit.path.as_str())
                        }
                        OrderRef::Tag(_) => false,
                    };
                    let kind = match (entry, clause) {
                        (OrderRef::Tag(_), _) => EdgeKind::Tag,
                        (_, Clause::After) => EdgeKind::After,
                        _ => EdgeKind::Before,
                    };

                    for other in targets {
                        if other == unit.path && !literal_self {
                            continue;
                        }
                        references.entry(unit.path.as_str()).or_default().push(other);
                        match clause {
                            Clause::After => dag.add_edge(other, &unit.path, kind),
                            _ => dag.add_edge(&unit.path, other, kind),
                        }
                    }
                }
            }

            // Implicit hierarchy: every ancestor unit runs before this one.
            let mut dir = unit.path.as_str();
            while let Some(cut) = dir.rfind('/') {
                dir = if cut == 0 { "/" } else { &dir[..cut] };
                if dir != unit.path && catalog.contains(dir) {
                    dag.add_edge(dir, &unit.path, EdgeKind::Nesting);
                }
                if dir == "/" {
                    break;
                }
            }
        }

        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = start.iter().map(String::as_str).collect();
        while let Some(path) = queue.pop_front() {
            if !reached.insert(path) {
                continue;
            }
            if let Some(targets) = references.get(path) {
                queue.extend(targets.iter().copied());
            }
        }

        for (unit, clause, entry, reason) in invalid {
            if reached.contains(unit) {
                diags.invalid_reference(unit, clause, entry, reason);
            } else {
                trace!(unit, %entry, "unreachable unit has an invalid reference");
            }
        }

        debug!(
            nodes = dag.len(),
            edges = dag.graph.edge_count(),
            "built ordering graph"
        );

        dag
    }

    /// Restrict the graph to `keep` (unknown paths are ignored).
    ///
    /// Ordering that runs through dropped units survives: `a -> b` is kept
    /// whenever the full graph has a path from `a` to `b` whose inner nodes
    /// are all outside `keep`.
    pub fn restrict(&self, keep: &[UnitPath]) -> Self {
        let mut sorted: Vec<&UnitPath> = keep.iter().filter(|p| self.contains(p)).collect();
        sorted.sort();
        sorted.dedup();

        let mut dag = DagGraph::default();
        for path in &sorted {
            dag.add_unit(path);
        }

        for from in &sorted {
            let start = self.index[from.as_str()];
            let mut seen = HashSet::from([start]);
            let mut queue = VecDeque::from([start]);

            // Breadth-first, so direct edges are recorded before indirect ones.
            while let Some(node) = queue.pop_front() {
                for edge in self.graph.edges(node) {
                    let next = edge.target();
                    let to = &self.graph[next];
                    if dag.contains(to) {
                        let kind = if node == start {
                            *edge.weight()
                        } else {
                            EdgeKind::Indirect
                        };
                        dag.add_edge(from, to, kind);
                    } else if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        dag
    }

    pub fn add_unit(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.index.insert(path.to_string(), idx);
        idx
    }

    /// Add `from -> to` unless the pair is already connected.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) {
        let a = self.add_unit(from);
        let b = self.add_unit(to);
        if self.graph.find_edge(a, b).is_none() {
            trace!(from, to, ?kind, "add ordering edge");
            self.graph.add_edge(a, b, kind);
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Unit paths in arena (insertion) order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|i| self.graph[i].as_str())
    }

    /// Direct predecessors: units that must be terminal before `path` starts.
    pub fn dependencies_of(&self, path: &str) -> Vec<&str> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Direct successors: units waiting on `path`.
    pub fn dependents_of(&self, path: &str) -> Vec<&str> {
        self.neighbors(path, Direction::Outgoing)
    }

    fn neighbors(&self, path: &str, dir: Direction) -> Vec<&str> {
        let Some(idx) = self.index.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(*idx, dir)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b).is_some(),
            _ => false,
        }
    }

    pub fn describe(&self) -> GraphDescription {
        let mut nodes: Vec<UnitPath> = self.units().map(str::to_string).collect();
        nodes.sort();

        let mut edges: Vec<EdgeDescription> = self
            .graph
            .edge_references()
            .map(|e| EdgeDescription {
                from: self.graph[e.source()].clone(),
                to: self.graph[e.target()].clone(),
                kind: *e.weight(),
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        GraphDescription { nodes, edges }
    }

    /// Graphviz rendering; edges point from the unit that runs first.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }

    pub(crate) fn arena(&self) -> &DiGraph<UnitPath, EdgeKind> {
        &self.graph
    }
}
