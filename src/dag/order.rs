// src/dag/order.rs

//! Cycle detection, deterministic topological order and failure closure.
//!
//! Everything here is a pure function over a [`DagGraph`]; the scheduler
//! calls [`descendants_of`] when a unit fails, independent of how execution
//! is driven.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use tracing::debug;

use crate::catalog::UnitPath;
use crate::dag::graph::DagGraph;
use crate::errors::{Result, StackdagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

fn sorted_successors(dag: &DagGraph, node: NodeIndex) -> Vec<NodeIndex> {
    let arena = dag.arena();
    let mut next: Vec<NodeIndex> = arena.neighbors_directed(node, Direction::Outgoing).collect();
    next.sort_by(|a, b| arena[*a].cmp(&arena[*b]));
    next.dedup();
    next
}

/// Find one cycle, visiting roots and children in path order.
///
/// The returned chain repeats its first node at the end
/// (`["/a", "/b", "/a"]`; a self-edge gives `["/a", "/a"]`).
pub fn find_cycle(dag: &DagGraph) -> Option<Vec<UnitPath>> {
    let arena = dag.arena();
    let mut starts: Vec<NodeIndex> = arena.node_indices().collect();
    starts.sort_by(|a, b| arena[*a].cmp(&arena[*b]));

    let mut color = vec![Color::Unvisited; arena.node_count()];

    for start in starts {
        if color[start.index()] != Color::Unvisited {
            continue;
        }

        color[start.index()] = Color::InProgress;
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
            vec![(start, sorted_successors(dag, start), 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let child = top.1.get(top.2).copied();
            top.2 += 1;

            let Some(child) = child else {
                color[node.index()] = Color::Done;
                stack.pop();
                continue;
            };

            match color[child.index()] {
                Color::Unvisited => {
                    color[child.index()] = Color::InProgress;
                    stack.push((child, sorted_successors(dag, child), 0));
                }
                Color::InProgress => {
                    let from = stack.iter().position(|(n, _, _)| *n == child).unwrap_or(0);
                    let mut chain: Vec<UnitPath> =
                        stack[from..].iter().map(|(n, _, _)| arena[*n].clone()).collect();
                    chain.push(arena[child].clone());
                    return Some(chain);
                }
                Color::Done => {}
            }
        }
    }

    None
}

/// Fail with [`StackdagError::CycleDetected`] if the graph has a cycle.
pub fn check_acyclic(dag: &DagGraph) -> Result<()> {
    match find_cycle(dag) {
        Some(chain) => Err(StackdagError::CycleDetected { chain }),
        None => Ok(()),
    }
}

/// Deterministic topological order.
///
/// Validates acyclicity first, then repeatedly takes the ready unit with the
/// smallest path (Kahn). The same graph always yields the same order.
pub fn topological_order(dag: &DagGraph) -> Result<Vec<UnitPath>> {
    check_acyclic(dag)?;

    let arena = dag.arena();
    let mut in_degree: Vec<usize> = arena
        .node_indices()
        .map(|n| sorted_predecessor_count(dag, n))
        .collect();

    let mut ready: BinaryHeap<Reverse<(&str, NodeIndex)>> = arena
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(|n| Reverse((arena[n].as_str(), n)))
        .collect();

    let mut order = Vec::with_capacity(arena.node_count());
    while let Some(Reverse((path, node))) = ready.pop() {
        order.push(path.to_string());
        for next in sorted_successors(dag, node) {
            let deg = &mut in_degree[next.index()];
            *deg -= 1;
            if *deg == 0 {
                ready.push(Reverse((arena[next].as_str(), next)));
            }
        }
    }

    debug!(units = order.len(), "computed topological order");
    Ok(order)
}

fn sorted_predecessor_count(dag: &DagGraph, node: NodeIndex) -> usize {
    let mut prev: Vec<NodeIndex> = dag
        .arena()
        .neighbors_directed(node, Direction::Incoming)
        .collect();
    prev.sort();
    prev.dedup();
    prev.len()
}

/// Every unit reachable from `path` through ordering edges, sorted.
///
/// `path` itself is not included.
pub fn descendants_of(dag: &DagGraph, path: &str) -> Vec<UnitPath> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = dag.dependents_of(path).into_iter().collect();

    while let Some(next) = queue.pop_front() {
        if next == path || !seen.insert(next) {
            continue;
        }
        queue.extend(dag.dependents_of(next));
    }

    let mut out: Vec<UnitPath> = seen.into_iter().map(str::to_string).collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Unit;
    use crate::diagnostics::Diagnostics;

    fn dag(spec: &[(&str, &[&str])]) -> DagGraph {
        let units: Vec<Unit> = spec
            .iter()
            .map(|(path, after)| {
                let mut u = Unit::new(*path);
                u.after = after.iter().map(|a| a.parse().unwrap()).collect();
                u
            })
            .collect();
        DagGraph::build(&units, &mut Diagnostics::new())
    }

    #[test]
    fn independent_units_sort_lexicographically() {
        let g = dag(&[
            ("/frita", &[]),
            ("/boom", &[]),
            ("/3", &[]),
            ("/batatinha", &[]),
            ("/1", &[]),
            ("/2", &[]),
        ]);
        assert_eq!(
            topological_order(&g).unwrap(),
            vec!["/1", "/2", "/3", "/batatinha", "/boom", "/frita"]
        );
    }

    #[test]
    fn diamond_orders_producers_first() {
        let g = dag(&[
            ("/stack-a", &["/stack-b", "/stack-c"]),
            ("/stack-b", &["/stack-d"]),
            ("/stack-c", &["/stack-d"]),
            ("/stack-d", &[]),
        ]);
        assert_eq!(
            topological_order(&g).unwrap(),
            vec!["/stack-d", "/stack-b", "/stack-c", "/stack-a"]
        );
    }

    #[test]
    fn ready_units_interleave_by_path() {
        let g = dag(&[("/a", &["/z"]), ("/b", &[]), ("/z", &[])]);
        assert_eq!(topological_order(&g).unwrap(), vec!["/b", "/z", "/a"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let g = dag(&[("/stack-a", &["/stack-a"])]);
        match topological_order(&g) {
            Err(StackdagError::CycleDetected { chain }) => {
                assert_eq!(chain, vec!["/stack-a", "/stack-a"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn cycle_chain_is_reported_in_full() {
        let g = dag(&[("/a", &["/c"]), ("/b", &["/a"]), ("/c", &["/b"]), ("/d", &[])]);
        let chain = find_cycle(&g).unwrap();
        assert_eq!(chain, vec!["/a", "/b", "/c", "/a"]);
        let err = check_acyclic(&g).unwrap_err();
        assert!(err.to_string().contains("/a -> /b -> /c -> /a"));
    }

    #[test]
    fn descendants_are_the_transitive_closure() {
        let g = dag(&[
            ("/s1", &[]),
            ("/s2", &["/s1"]),
            ("/s3", &["/s2"]),
            ("/other", &[]),
        ]);
        assert_eq!(descendants_of(&g, "/s1"), vec!["/s2", "/s3"]);
        assert!(descendants_of(&g, "/other").is_empty());
    }
}
