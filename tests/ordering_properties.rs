// tests/ordering_properties.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use proptest::prelude::*;
use stackdag::catalog::Unit;
use stackdag::dag::{descendants_of, Scheduler, SchedulerOptions};
use stackdag::engine::UnitOutcome;
use stackdag::plan::{build_plan, PlanOptions};
use stackdag::types::UnitStatus;
use stackdag_test_utils::builders::UnitBuilder;

fn name(i: usize) -> String {
    format!("/u{i:02}")
}

// Acyclic by construction: unit N only orders after units 0..N-1.
fn dag_strategy(max_units: usize) -> impl Strategy<Value = Vec<Unit>> {
    (1..=max_units).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            move |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let deps: BTreeSet<usize> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        };
                        deps.into_iter()
                            .fold(UnitBuilder::new(&name(i)), |b, d| b.after(&name(d)))
                            .build()
                    })
                    .collect()
            },
        )
    })
}

fn reversed() -> PlanOptions {
    PlanOptions {
        reverse: true,
        ..PlanOptions::default()
    }
}

proptest! {
    #[test]
    fn order_respects_every_edge(units in dag_strategy(12)) {
        let plan = build_plan(&units, &PlanOptions::default()).unwrap();
        let pos: HashMap<&str, usize> = plan
            .order()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();

        prop_assert_eq!(pos.len(), units.len());
        for unit in &units {
            for dep in plan.graph().dependencies_of(&unit.path) {
                prop_assert!(pos[dep] < pos[unit.path.as_str()]);
            }
        }
    }

    #[test]
    fn order_ignores_catalog_order(units in dag_strategy(12)) {
        let plan = build_plan(&units, &PlanOptions::default()).unwrap();

        let mut shuffled = units.clone();
        shuffled.reverse();
        let again = build_plan(&shuffled, &PlanOptions::default()).unwrap();

        prop_assert_eq!(plan.order(), again.order());
    }

    #[test]
    fn reverse_is_the_exact_mirror(units in dag_strategy(12)) {
        let forward = build_plan(&units, &PlanOptions::default()).unwrap();
        let backward = build_plan(&units, &reversed()).unwrap();

        let mut mirrored = forward.order().to_vec();
        mirrored.reverse();
        prop_assert_eq!(backward.order(), mirrored.as_slice());
    }

    #[test]
    fn scheduler_always_terminates(
        units in dag_strategy(10),
        failing in proptest::collection::vec(0..10usize, 0..4),
        max_running in 1..4usize,
        continue_on_error in any::<bool>(),
    ) {
        let plan = build_plan(&units, &PlanOptions::default()).unwrap();
        let failing: HashSet<String> = failing.into_iter().map(name).collect();
        let mut scheduler = Scheduler::from_plan(
            &plan,
            SchedulerOptions { max_running, continue_on_error },
        );

        let mut executing: Vec<String> = scheduler
            .start()
            .newly_scheduled
            .into_iter()
            .map(|s| s.path)
            .collect();
        let mut ran: HashSet<String> = executing.iter().cloned().collect();

        let mut steps = 0;
        while !scheduler.is_finished() {
            steps += 1;
            prop_assert!(steps < 1000, "simulation did not converge");
            prop_assert!(!executing.is_empty(), "stuck with nothing running");
            prop_assert!(scheduler.running_count() <= max_running);

            let unit = executing.remove(0);
            let outcome = if failing.contains(&unit) {
                UnitOutcome::Failed(1)
            } else {
                UnitOutcome::Success
            };
            for next in scheduler.step_completion(&unit, outcome, Vec::new()).newly_scheduled {
                prop_assert!(ran.insert(next.path.clone()), "{} dispatched twice", next.path);
                executing.push(next.path);
            }
        }

        let summary = scheduler.summary();
        prop_assert_eq!(summary.units.len(), units.len());
        for (path, record) in &summary.units {
            prop_assert!(record.status.is_terminal());
            if continue_on_error {
                prop_assert!(record.status != UnitStatus::Canceled, "{} canceled", path);
            }
        }

        if !continue_on_error {
            // Each failure cancels exactly its own successors.
            let canceled: BTreeSet<String> = summary
                .units
                .iter()
                .filter(|(_, r)| r.status == UnitStatus::Canceled)
                .map(|(p, _)| p.clone())
                .collect();
            let expected: BTreeSet<String> = summary
                .units
                .iter()
                .filter(|(_, r)| r.status == UnitStatus::Failed)
                .flat_map(|(p, _)| descendants_of(plan.graph(), p))
                .filter(|p| !ran.contains(p))
                .collect();
            prop_assert_eq!(canceled, expected);
        }
    }
}
