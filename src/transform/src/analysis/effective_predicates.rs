// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Predicates that hold for every row produced by a plan node.
//!
//! The predicates of a node are derived from those of its inputs: filters
//! contribute their conditions, joins combine or drop their inputs' facts
//! according to which side may be padded with nulls, and projections and
//! aggregations restate facts in terms of the columns they produce. After
//! each step an [`InferenceOracle`] adds what follows from the facts, and
//! anything that mentions a column the node does not produce is dropped.

use std::collections::BTreeMap;

use quarry_expr::{Conjuncts, JoinKind, LogicalPlan, NamedExpr, ScalarExpr};

use crate::analysis::inference::InferenceOracle;
use crate::analysis::Analysis;

/// Computes the predicates known to hold for every row of `plan`.
///
/// Every returned predicate reads only columns in `plan.output()`.
#[tracing::instrument(target = "optimizer", level = "trace", skip_all)]
pub fn extract_effective_predicates(
    plan: &LogicalPlan,
    oracle: &dyn InferenceOracle,
) -> Conjuncts {
    crate::analysis::derive(&EffectivePredicates::new(oracle), plan)
        .into_root()
        .unwrap_or_default()
}

/// The effective predicates of each plan node.
#[derive(Debug)]
pub struct EffectivePredicates<'a> {
    oracle: &'a dyn InferenceOracle,
}

impl<'a> EffectivePredicates<'a> {
    /// Effective predicates completed by `oracle` at each node.
    pub fn new(oracle: &'a dyn InferenceOracle) -> Self {
        EffectivePredicates { oracle }
    }

    /// Completes `predicates` with inferred facts, then restricts them to
    /// the output of `plan`.
    fn available(&self, plan: &LogicalPlan, mut predicates: Conjuncts) -> Conjuncts {
        let inferred = self.oracle.infer(&predicates);
        predicates.extend(inferred);
        let output = plan.output_set();
        predicates.retain(|predicate| predicate.input_slots().is_subset(&output));
        predicates
    }
}

impl Analysis for EffectivePredicates<'_> {
    type Value = Conjuncts;

    fn derive(&self, plan: &LogicalPlan, children: &[&Conjuncts]) -> Conjuncts {
        let predicates = match plan {
            LogicalPlan::Filter { predicates, .. } => {
                let mut result = predicates
                    .iter()
                    .flat_map(ScalarExpr::conjuncts)
                    .filter(|predicate| !predicate.is_correlated_subquery())
                    .collect::<Conjuncts>();
                result.extend(children[0].iter().cloned());
                result
            }
            LogicalPlan::Join { kind, on, .. } => {
                let (left, right) = (children[0], children[1]);
                let on = on.iter().flat_map(ScalarExpr::conjuncts);
                match kind {
                    JoinKind::Inner | JoinKind::Cross => {
                        left.iter().chain(right.iter()).cloned().chain(on).collect()
                    }
                    JoinKind::LeftSemi => left.iter().cloned().chain(on).collect(),
                    JoinKind::RightSemi => right.iter().cloned().chain(on).collect(),
                    JoinKind::LeftOuter | JoinKind::LeftAnti => left.clone(),
                    JoinKind::RightOuter | JoinKind::RightAnti => right.clone(),
                    JoinKind::FullOuter | JoinKind::NullAwareLeftAnti => return Conjuncts::new(),
                }
            }
            LogicalPlan::Project { projections, .. } => {
                // Restate facts about producing expressions over the slots
                // they are projected to.
                let mut producers = BTreeMap::new();
                for alias in projections.iter().filter_map(NamedExpr::as_alias) {
                    producers
                        .entry(alias.expr.clone())
                        .or_insert_with(|| ScalarExpr::slot(&alias.slot));
                }
                restate(children[0], &producers)
            }
            LogicalPlan::Aggregate { outputs, .. } => {
                let producers = outputs
                    .iter()
                    .filter(|output| output.expr().contains_aggregate())
                    .map(|output| (output.expr(), ScalarExpr::slot(&output.to_slot())))
                    .collect();
                restate(children[0], &producers)
            }
            LogicalPlan::Get { .. }
            | LogicalPlan::Having { .. }
            | LogicalPlan::Qualify { .. }
            | LogicalPlan::Limit { .. } => return Conjuncts::new(),
        };
        let predicates = self.available(plan, predicates);
        tracing::trace!(
            target: "optimizer",
            output = ?plan.output(),
            predicates = %ScalarExpr::and_all(predicates.iter().cloned()),
            "effective predicates"
        );
        predicates
    }
}

/// Replaces each occurrence of a key of `producers` by its value.
fn restate(predicates: &Conjuncts, producers: &BTreeMap<ScalarExpr, ScalarExpr>) -> Conjuncts {
    ScalarExpr::and_all(predicates.iter().cloned())
        .substituted(producers)
        .conjuncts()
        .into_iter()
        .collect()
}
