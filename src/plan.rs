// src/plan.rs

//! Planning pipeline: everything that happens before the first process starts.
//!
//! Selector -> expander -> ordering graph over the whole catalog -> the
//! selection, keeping ordering that ran through unselected units -> cycle
//! check -> deterministic order.
//! Any structural error aborts here, so a failed plan never runs anything.

use tracing::{debug, info};

use crate::catalog::{Unit, UnitCatalog, UnitPath};
use crate::dag::graph::{DagGraph, GraphDescription};
use crate::dag::order::topological_order;
use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::select::{expand_selection, Selector};

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub selector: Selector,
    /// Flip the reported order (teardown-style walks).
    pub reverse: bool,
}

/// A validated, ordered selection ready to be scheduled.
#[derive(Debug, Clone)]
pub struct Plan {
    units: Vec<Unit>,
    graph: DagGraph,
    order: Vec<UnitPath>,
    roots: Vec<UnitPath>,
    diagnostics: Diagnostics,
    reverse: bool,
}

impl Plan {
    /// Selected units in reported order.
    pub fn order(&self) -> &[UnitPath] {
        &self.order
    }

    /// Ordering graph restricted to the selection.
    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Selected units, sorted by path.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Units picked by the selector before expansion.
    pub fn roots(&self) -> &[UnitPath] {
        &self.roots
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn describe(&self) -> GraphDescription {
        self.graph.describe()
    }

    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }
}

pub fn build_plan<C: UnitCatalog + ?Sized>(catalog: &C, options: &PlanOptions) -> Result<Plan> {
    let mut all = catalog.list_units();
    all.sort_by(|a, b| a.path.cmp(&b.path));

    let roots = options.selector.select(&all);
    let expansion = expand_selection(&all, &roots)?;

    let mut diagnostics = expansion.diagnostics;
    let full = DagGraph::build_from(&all, &expansion.selected, &mut diagnostics);
    let graph = full.restrict(&expansion.selected);

    // Warnings are surfaced once, whether or not the plan is usable.
    diagnostics.emit();

    let mut order = topological_order(&graph)?;
    if options.reverse {
        order.reverse();
    }

    let units: Vec<Unit> = all
        .into_iter()
        .filter(|u| graph.contains(&u.path))
        .collect();

    debug!(?order, "planned order");
    info!(
        roots = roots.len(),
        pulled = expansion.pulled.len(),
        selected = order.len(),
        reverse = options.reverse,
        "plan ready"
    );

    Ok(Plan {
        units,
        graph,
        order,
        roots,
        diagnostics,
        reverse: options.reverse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StackdagError;
    use crate::select::TagFilter;
    use crate::types::OrderRef;

    fn unit(path: &str, tags: &[&str], after: &[&str]) -> Unit {
        let mut u = Unit::new(path);
        u.tags = tags.iter().map(|t| t.to_string()).collect();
        u.after = after.iter().map(|a| a.parse().unwrap()).collect();
        u
    }

    fn tagged(include: &[&str]) -> PlanOptions {
        PlanOptions {
            selector: Selector::new(TagFilter::new(include.iter().copied(), Vec::<&str>::new()).unwrap()),
            reverse: false,
        }
    }

    #[test]
    fn tag_edges_to_unselected_units_are_dropped() {
        let catalog = vec![
            unit("/app", &["web"], &["tag:db"]),
            unit("/pg", &["db"], &[]),
        ];

        let plan = build_plan(&catalog, &tagged(&["web"])).unwrap();
        assert_eq!(plan.order(), ["/app"]);
        assert!(plan.graph().dependencies_of("/app").is_empty());

        let plan = build_plan(&catalog, &PlanOptions::default()).unwrap();
        assert_eq!(plan.order(), ["/pg", "/app"]);
    }

    #[test]
    fn ordering_through_unselected_units_is_kept() {
        let catalog = vec![
            unit("/a", &["sel"], &["/b"]),
            unit("/b", &[], &["/c"]),
            unit("/c", &["sel"], &[]),
        ];

        let plan = build_plan(&catalog, &tagged(&["sel"])).unwrap();
        assert_eq!(plan.order(), ["/c", "/a"]);
        assert!(plan.graph().has_edge("/c", "/a"));
    }

    #[test]
    fn warnings_skip_units_unrelated_to_the_selection() {
        let catalog = vec![
            unit("/a", &["sel"], &["/missing"]),
            unit("/z", &[], &["/also-missing"]),
        ];

        let plan = build_plan(&catalog, &tagged(&["sel"])).unwrap();
        let warned: Vec<String> = plan.diagnostics().warnings().map(|w| w.to_string()).collect();
        assert_eq!(warned.len(), 1);
        assert!(warned[0].contains("/missing"), "{warned:?}");
    }

    #[test]
    fn wants_pull_units_past_tag_filters() {
        let mut app = unit("/app", &["web"], &[]);
        app.wants.push(OrderRef::Path("/cache".into()));
        let catalog = vec![app, unit("/cache", &["infra"], &[]), unit("/other", &[], &[])];

        let plan = build_plan(&catalog, &tagged(&["web"])).unwrap();
        assert_eq!(plan.order(), ["/app", "/cache"]);
        assert_eq!(plan.roots(), ["/app"]);
    }

    #[test]
    fn reverse_flips_order_but_not_edges() {
        let catalog = vec![unit("/a", &[], &[]), unit("/b", &[], &["/a"])];
        let plan = build_plan(
            &catalog,
            &PlanOptions {
                reverse: true,
                ..PlanOptions::default()
            },
        )
        .unwrap();

        assert_eq!(plan.order(), ["/b", "/a"]);
        assert!(plan.graph().has_edge("/a", "/b"));
        assert!(plan.is_reversed());
    }

    #[test]
    fn cycle_outside_the_selection_is_ignored() {
        let catalog = vec![
            unit("/x", &["loop"], &["/y"]),
            unit("/y", &["loop"], &["/x"]),
            unit("/z", &["ok"], &[]),
        ];

        assert!(build_plan(&catalog, &tagged(&["ok"])).is_ok());
        let err = build_plan(&catalog, &tagged(&["loop"])).unwrap_err();
        assert!(matches!(err, StackdagError::CycleDetected { .. }));
    }

    #[test]
    fn empty_selection_plans_nothing() {
        let catalog = vec![unit("/a", &["x"], &[])];
        let plan = build_plan(&catalog, &tagged(&["nope"])).unwrap();
        assert!(plan.is_empty());
    }
}
