// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use proptest::prelude::*;
use quarry_expr::{Alias, Conjuncts, LogicalPlan, NamedExpr, ScalarExpr, Slot, SlotId};
use quarry_expr_test_util::*;
use quarry_transform::fill_up::{
    complete_qualify_aggregate, complete_qualify_having_aggregate,
    complete_qualify_having_project, complete_qualify_project, FillUpQualifyMissingSlots,
};
use quarry_transform::{Optimizer, Transform, TransformConfig, TransformCtx};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn conjuncts(predicates: Vec<ScalarExpr>) -> Conjuncts {
    predicates.into_iter().collect()
}

/// An alias for `expr` at slot `id`, as allocated by a completion.
fn synthesized(id: u64, expr: ScalarExpr) -> NamedExpr {
    NamedExpr::Alias(Alias {
        slot: Slot::new(SlotId::from(id), expr.to_string()),
        expr,
    })
}

/// Asserts that no `Qualify` in `plan` is missing anything.
fn assert_complete(plan: &LogicalPlan, catalog: &mut TestCatalog) {
    let mut qualifies = Vec::new();
    plan.visit_post(&mut |node| {
        if let LogicalPlan::Qualify { .. } = node {
            qualifies.push(node);
        }
    });
    assert!(!qualifies.is_empty());
    for qualify in qualifies {
        assert_eq!(
            FillUpQualifyMissingSlots.action(qualify, catalog.id_gen()),
            None,
            "qualify is still incomplete:\n{}",
            qualify
        );
    }
}

#[test]
fn window_is_computed_below_qualify() {
    init_tracing();
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b", "c"]);
    let project = t.clone().project(catalog.cols(&["a", "b"]));
    let window = rank(vec![catalog.col("a")], vec![catalog.col("c")]);
    let predicates = conjuncts(vec![gt(window.clone(), lit(1))]);

    let completed = complete_qualify_project(&predicates, &project, catalog.id_gen())
        .expect("rank is missing");

    let rank_slot = synthesized(4, window);
    let expected = t
        .project(vec![
            NamedExpr::Slot(catalog.slot("a")),
            NamedExpr::Slot(catalog.slot("b")),
            rank_slot.clone(),
            NamedExpr::Slot(catalog.slot("c")),
        ])
        .qualify(vec![gt(ScalarExpr::slot(&rank_slot.to_slot()), lit(1))])
        .project_slots(vec![catalog.slot("a"), catalog.slot("b")], false);
    assert_eq!(completed, expected, "\n{}", completed);
    assert_eq!(completed.output(), project.output());
    assert_complete(&completed, &mut catalog);
}

#[test]
fn present_columns_are_not_rewritten() {
    let mut catalog = TestCatalog::new();
    let project = catalog
        .table("t", &["a", "b"])
        .project(catalog.cols(&["a", "b"]));
    let predicates = conjuncts(vec![gt(catalog.col("a"), lit(5))]);
    assert_eq!(
        complete_qualify_project(&predicates, &project, catalog.id_gen()),
        None
    );
}

#[test]
fn distinct_projection_stays_on_top() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let project = t.clone().project_distinct(catalog.cols(&["a"]));
    let predicates = conjuncts(vec![gt(catalog.col("b"), lit(0))]);

    let completed = complete_qualify_project(&predicates, &project, catalog.id_gen())
        .expect("b is missing");

    let expected = t
        .project(catalog.cols(&["a", "b"]))
        .qualify(predicates)
        .project_slots(vec![catalog.slot("a")], true);
    assert_eq!(completed, expected);
}

#[test]
fn existing_columns_are_not_duplicated() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let project = t.project(catalog.cols(&["a"]));
    let predicates = conjuncts(vec![
        gt(catalog.col("b"), lit(0)),
        lt(add(catalog.col("b"), catalog.col("a")), lit(9)),
    ]);

    let completed = complete_qualify_project(&predicates, &project, catalog.id_gen())
        .expect("b is missing");

    let LogicalPlan::Project { input, .. } = &completed else {
        panic!("expected a projection on top:\n{}", completed);
    };
    let LogicalPlan::Qualify { input, .. } = &**input else {
        panic!("expected a qualify:\n{}", completed);
    };
    assert_eq!(input.output(), vec![catalog.slot("a"), catalog.slot("b")]);
}

#[test]
fn missing_aggregate_becomes_an_output() {
    init_tracing();
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let aggregate = t
        .clone()
        .aggregate(vec![catalog.col("a")], catalog.cols(&["a"]));
    let predicates = conjuncts(vec![gt(sum(catalog.col("b")), lit(10))]);

    let completed = complete_qualify_aggregate(&predicates, &aggregate, catalog.id_gen())
        .expect("sum is missing");

    let total = synthesized(3, sum(catalog.col("b")));
    let expected = t
        .aggregate(
            vec![catalog.col("a")],
            vec![NamedExpr::Slot(catalog.slot("a")), total.clone()],
        )
        .qualify(vec![gt(ScalarExpr::slot(&total.to_slot()), lit(10))])
        .project_slots(vec![catalog.slot("a")], false);
    assert_eq!(completed, expected, "\n{}", completed);
    assert_complete(&completed, &mut catalog);
}

#[test]
fn computed_aggregate_is_reused() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let outputs = vec![
        NamedExpr::Slot(catalog.slot("a")),
        catalog.alias("total", sum(catalog.col("b"))),
    ];
    let aggregate = t.clone().aggregate(vec![catalog.col("a")], outputs.clone());
    let predicates = conjuncts(vec![gt(sum(catalog.col("b")), lit(10))]);

    let completed = complete_qualify_aggregate(&predicates, &aggregate, catalog.id_gen())
        .expect("sum is computed under another name");

    // Only the predicates change, so the schema needs no restoring projection.
    let expected = aggregate
        .clone()
        .qualify(vec![gt(catalog.col("total"), lit(10))]);
    assert_eq!(completed, expected);

    let resolved = conjuncts(vec![gt(catalog.col("total"), lit(10))]);
    assert_eq!(
        complete_qualify_aggregate(&resolved, &aggregate, catalog.id_gen()),
        None
    );
}

#[test]
fn group_key_is_passed_through() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b", "c"]);
    let outputs = vec![
        NamedExpr::Slot(catalog.slot("a")),
        catalog.alias("total", sum(catalog.col("c"))),
    ];
    let group_key = vec![catalog.col("a"), catalog.col("b")];
    let aggregate = t.clone().aggregate(group_key.clone(), outputs.clone());
    let predicates = conjuncts(vec![gt(catalog.col("b"), lit(1))]);

    let completed = complete_qualify_aggregate(&predicates, &aggregate, catalog.id_gen())
        .expect("b is missing");

    let mut extended = outputs;
    extended.push(NamedExpr::Slot(catalog.slot("b")));
    let expected = t
        .aggregate(group_key, extended)
        .qualify(predicates)
        .project_slots(vec![catalog.slot("a"), catalog.slot("total")], false);
    assert_eq!(completed, expected);
}

#[test]
fn having_is_kept_between_qualify_and_aggregate() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let outputs = vec![
        NamedExpr::Slot(catalog.slot("a")),
        catalog.alias("total", sum(catalog.col("b"))),
    ];
    let having_predicates = vec![gt(catalog.col("total"), lit(5))];
    let having = t
        .clone()
        .aggregate(vec![catalog.col("a")], outputs.clone())
        .having(having_predicates.clone());
    let predicates = conjuncts(vec![gt(count(catalog.col("b")), lit(1))]);

    let completed = complete_qualify_having_aggregate(&predicates, &having, catalog.id_gen())
        .expect("count is missing");

    let cnt = synthesized(4, count(catalog.col("b")));
    let mut extended = outputs;
    extended.push(cnt.clone());
    let expected = t
        .aggregate(vec![catalog.col("a")], extended)
        .having(having_predicates)
        .qualify(vec![gt(ScalarExpr::slot(&cnt.to_slot()), lit(1))])
        .project_slots(vec![catalog.slot("a"), catalog.slot("total")], false);
    assert_eq!(completed, expected, "\n{}", completed);
    assert_eq!(completed.output(), having.output());
    assert_complete(&completed, &mut catalog);
}

#[test]
fn having_over_projection() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b", "c"]);
    let having_predicates = vec![gt(catalog.col("a"), lit(0))];
    let having = t
        .clone()
        .project(catalog.cols(&["a", "b"]))
        .having(having_predicates.clone());
    let window = row_number(vec![], vec![catalog.col("c")]);
    let predicates = conjuncts(vec![eq(window.clone(), lit(1))]);

    let completed = complete_qualify_having_project(&predicates, &having, catalog.id_gen())
        .expect("row_number is missing");

    let rn = synthesized(4, window);
    let expected = t
        .project(vec![
            NamedExpr::Slot(catalog.slot("a")),
            NamedExpr::Slot(catalog.slot("b")),
            rn.clone(),
            NamedExpr::Slot(catalog.slot("c")),
        ])
        .qualify(vec![eq(ScalarExpr::slot(&rn.to_slot()), lit(1))])
        .having(having_predicates)
        .project_slots(vec![catalog.slot("a"), catalog.slot("b")], false);
    assert_eq!(completed, expected, "\n{}", completed);
    assert_complete(&completed, &mut catalog);
}

#[test]
fn having_over_distinct_projection() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b", "c"]);
    let having_predicates = vec![gt(catalog.col("b"), lit(0))];
    let having = t
        .clone()
        .project_distinct(catalog.cols(&["a"]))
        .having(having_predicates.clone());
    let window = row_number(vec![], vec![catalog.col("c")]);
    let predicates = conjuncts(vec![eq(window.clone(), lit(1))]);

    let completed = complete_qualify_having_project(&predicates, &having, catalog.id_gen())
        .expect("row_number is missing");

    let rn = synthesized(4, window);
    let expected = t
        .project(vec![
            NamedExpr::Slot(catalog.slot("a")),
            rn.clone(),
            NamedExpr::Slot(catalog.slot("c")),
            NamedExpr::Slot(catalog.slot("b")),
        ])
        .qualify(vec![eq(ScalarExpr::slot(&rn.to_slot()), lit(1))])
        .project_slots(vec![catalog.slot("a"), catalog.slot("b")], false)
        .having(having_predicates)
        .project_slots(vec![catalog.slot("a")], true);
    assert_eq!(completed, expected, "\n{}", completed);
    assert_eq!(completed.output(), having.output());
    assert_complete(&completed, &mut catalog);
}

#[test]
fn having_columns_alone_need_nothing() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let having = t
        .project_distinct(catalog.cols(&["a"]))
        .having(vec![gt(catalog.col("b"), lit(0))]);
    let predicates = conjuncts(vec![gt(catalog.col("a"), lit(1))]);

    assert_eq!(
        complete_qualify_having_project(&predicates, &having, catalog.id_gen()),
        None
    );
}

#[test]
fn column_missing_for_having_and_qualify_is_added_once() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let having_predicates = vec![gt(catalog.col("b"), lit(0))];
    let having = t
        .clone()
        .project_distinct(catalog.cols(&["a"]))
        .having(having_predicates.clone());
    let predicates = conjuncts(vec![lt(catalog.col("b"), lit(5))]);

    let completed = complete_qualify_having_project(&predicates, &having, catalog.id_gen())
        .expect("b is missing");

    let expected = t
        .project(catalog.cols(&["a", "b"]))
        .qualify(predicates)
        .project_slots(vec![catalog.slot("a"), catalog.slot("b")], false)
        .having(having_predicates)
        .project_slots(vec![catalog.slot("a")], true);
    assert_eq!(completed, expected, "\n{}", completed);
}

#[test]
fn unsupported_shapes_are_left_alone() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a"]);
    let predicates = conjuncts(vec![gt(rank(vec![], vec![catalog.col("a")]), lit(1))]);
    let plan = t.clone().limit(3).qualify(predicates.iter().cloned());
    assert_eq!(FillUpQualifyMissingSlots.action(&plan, catalog.id_gen()), None);
    assert_eq!(complete_qualify_project(&predicates, &t, catalog.id_gen()), None);
    assert_eq!(complete_qualify_aggregate(&predicates, &t, catalog.id_gen()), None);
    assert_eq!(complete_qualify_having_project(&predicates, &t, catalog.id_gen()), None);
}

#[test]
fn transform_completes_nested_qualifies() {
    init_tracing();
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let inner = t
        .project(catalog.cols(&["a", "b"]))
        .qualify(vec![gt(rank(vec![], vec![catalog.col("b")]), lit(1))]);
    let plan = inner
        .project(catalog.cols(&["a"]))
        .qualify(vec![lt(catalog.col("b"), lit(3))])
        .limit(10);

    let config = TransformConfig::default();
    let mut completed = plan.clone();
    let mut ctx = TransformCtx::new(catalog.id_gen(), &config);
    FillUpQualifyMissingSlots
        .transform(&mut completed, &mut ctx)
        .expect("fill up");

    assert_ne!(completed, plan);
    assert_eq!(completed.output(), plan.output());
    assert_complete(&completed, &mut catalog);
}

#[test]
fn disabled_transform_does_nothing() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let plan = t
        .project(catalog.cols(&["a"]))
        .qualify(vec![gt(catalog.col("b"), lit(1))]);
    let config = TransformConfig {
        enable_fill_up_qualify: false,
        ..Default::default()
    };
    let optimized = Optimizer::qualify_completion()
        .optimize(plan.clone(), &config)
        .expect("optimize");
    assert_eq!(optimized, plan);
}

#[test]
fn optimizer_allocates_above_existing_slots() {
    let mut catalog = TestCatalog::new();
    let t = catalog.table("t", &["a", "b"]);
    let plan = t
        .project(vec![
            NamedExpr::Slot(catalog.slot("a")),
            catalog.alias("c", add(catalog.col("b"), lit(1))),
        ])
        .qualify(vec![gt(row_number(vec![], vec![catalog.col("c")]), lit(1))]);

    let optimized = Optimizer::qualify_completion()
        .optimize(plan.clone(), &TransformConfig::default())
        .expect("optimize");

    assert_eq!(optimized.output(), plan.output());
    assert_eq!(optimized.max_slot_id(), Some(SlotId::from(4)));
    let again = Optimizer::qualify_completion()
        .optimize(optimized.clone(), &TransformConfig::default())
        .expect("optimize");
    assert_eq!(again, optimized);
}

/// A column referenced by a generated qualify predicate.
#[derive(Debug, Clone)]
enum Reference {
    Column(usize),
    Rank { partition: usize, order: usize },
}

fn reference() -> impl Strategy<Value = Reference> {
    prop_oneof![
        (0..4usize).prop_map(Reference::Column),
        (0..4usize, 0..4usize).prop_map(|(partition, order)| Reference::Rank { partition, order }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn completion_preserves_output(
        projected in proptest::sample::subsequence(vec![0usize, 1, 2, 3], 1..4),
        distinct in any::<bool>(),
        having in proptest::option::of(0..4usize),
        references in proptest::collection::vec(reference(), 1..4),
    ) {
        let names = ["a", "b", "c", "d"];
        let mut catalog = TestCatalog::new();
        let t = catalog.table("t", &names);
        let columns = projected.iter().map(|i| names[*i]).collect::<Vec<_>>();
        let project = LogicalPlan::Project {
            input: Box::new(t),
            projections: catalog.cols(&columns),
            distinct,
        };
        let predicates = references
            .iter()
            .map(|reference| match reference {
                Reference::Column(i) => gt(catalog.col(names[*i]), lit(0)),
                Reference::Rank { partition, order } => gt(
                    rank(vec![catalog.col(names[*partition])], vec![catalog.col(names[*order])]),
                    lit(1),
                ),
            })
            .collect::<Conjuncts>();
        let child = match having {
            Some(i) => project.having(vec![lt(catalog.col(names[i]), lit(9))]),
            None => project,
        };
        let plan = child.clone().qualify(predicates.iter().cloned());

        let completed = match &child {
            LogicalPlan::Having { .. } => {
                complete_qualify_having_project(&predicates, &child, catalog.id_gen())
            }
            _ => complete_qualify_project(&predicates, &child, catalog.id_gen()),
        };

        let nothing_missing = references.iter().all(|reference| {
            matches!(reference, Reference::Column(i) if projected.contains(i))
        });
        prop_assert_eq!(completed.is_none(), nothing_missing);
        if let Some(completed) = completed {
            prop_assert_eq!(completed.output(), plan.output());
            assert_complete(&completed, &mut catalog);
        }
    }
}
