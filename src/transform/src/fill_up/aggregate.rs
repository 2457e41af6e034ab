// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Completion of a `Qualify` over an aggregation, with or without an
//! intervening `Having`.

use quarry_expr::{Alias, Conjuncts, LogicalPlan, NamedExpr, ScalarExpr, SlotIdGen};

use super::preserving_output;

/// Completes `Qualify(predicates) → Aggregate`.
///
/// Subexpressions of `predicates` the aggregate already computes are replaced
/// by references to its output, aggregate calls it does not compute become
/// new outputs, and referenced group key columns are passed through. If
/// outputs were added, the result is wrapped in a projection of the original
/// outputs.
///
/// Returns `None` if `aggregate` is not an `Aggregate` or neither its outputs
/// nor `predicates` change.
pub fn complete_qualify_aggregate(
    predicates: &Conjuncts,
    aggregate: &LogicalPlan,
    id_gen: &mut SlotIdGen,
) -> Option<LogicalPlan> {
    complete(predicates, None, aggregate, id_gen)
}

/// Completes `Qualify(predicates) → Having → Aggregate`.
///
/// Behaves as [`complete_qualify_aggregate`]; the `Having` is kept unchanged
/// between the `Qualify` and the aggregate.
pub fn complete_qualify_having_aggregate(
    predicates: &Conjuncts,
    having: &LogicalPlan,
    id_gen: &mut SlotIdGen,
) -> Option<LogicalPlan> {
    let LogicalPlan::Having {
        input,
        predicates: having_predicates,
    } = having
    else {
        return None;
    };
    complete(predicates, Some(having_predicates), input, id_gen)
}

fn complete(
    predicates: &Conjuncts,
    having: Option<&Conjuncts>,
    aggregate: &LogicalPlan,
    id_gen: &mut SlotIdGen,
) -> Option<LogicalPlan> {
    let LogicalPlan::Aggregate {
        input,
        group_key,
        outputs,
    } = aggregate
    else {
        return None;
    };

    let mut resolver = Resolver {
        group_key,
        outputs: outputs.clone(),
        id_gen,
    };
    let resolved = predicates
        .iter()
        .map(|predicate| resolver.resolve(predicate))
        .collect::<Conjuncts>();
    let extended = resolver.outputs;

    let appended = extended.len() > outputs.len();
    if !appended && resolved == *predicates {
        return None;
    }

    let output = aggregate.output();
    let mut fragment = input.as_ref().clone().aggregate(group_key.clone(), extended);
    if let Some(having) = having {
        fragment = fragment.having(having.iter().cloned());
    }
    fragment = fragment.qualify(resolved);
    if appended {
        fragment = fragment.project_slots(output.clone(), false);
    }
    Some(preserving_output(output, fragment))
}

/// Rewrites expressions over an aggregate's input into expressions over its
/// output, adding outputs as needed.
struct Resolver<'a> {
    group_key: &'a [ScalarExpr],
    /// The original outputs, followed by any added ones.
    outputs: Vec<NamedExpr>,
    id_gen: &'a mut SlotIdGen,
}

impl Resolver<'_> {
    fn resolve(&mut self, expr: &ScalarExpr) -> ScalarExpr {
        if let ScalarExpr::Slot(slot) = expr {
            if self.outputs.iter().any(|output| output.to_slot() == *slot) {
                return expr.clone();
            }
            if self.group_key.contains(expr) {
                self.outputs.push(NamedExpr::Slot(slot.clone()));
                return expr.clone();
            }
            tracing::debug!(
                target: "optimizer",
                slot = %slot,
                "qualify references a column the aggregate cannot produce"
            );
            return expr.clone();
        }
        if let Some(alias) = self
            .outputs
            .iter()
            .filter_map(NamedExpr::as_alias)
            .find(|alias| alias.expr == *expr)
        {
            return ScalarExpr::slot(&alias.slot);
        }
        if matches!(expr, ScalarExpr::Aggregate(_)) || self.group_key.contains(expr) {
            let alias = Alias::fresh_unnamed(expr.clone(), self.id_gen);
            let slot = ScalarExpr::slot(&alias.slot);
            self.outputs.push(NamedExpr::Alias(alias));
            return slot;
        }
        let mut resolved = expr.clone();
        resolved.visit_mut_children(|child| *child = self.resolve(child));
        resolved
    }
}
