// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Completion of a `Qualify` over a projection, with or without an
//! intervening `Having`.

use std::collections::BTreeSet;
use std::mem;

use quarry_expr::{Alias, Conjuncts, LogicalPlan, NamedExpr, ScalarExpr, Slot, SlotIdGen};

use super::preserving_output;

/// Completes `Qualify(predicates) → Project`.
///
/// Window function calls in `predicates` are computed as new columns of the
/// projection, and input columns the predicates read are passed through it.
/// The result is
///
/// ```text
/// Project(original output, original distinct)
///   Qualify(predicates over the new columns)
///     Project(original projections ++ new columns)
///       input
/// ```
///
/// Returns `None` if `project` is not a `Project` or nothing is missing.
pub fn complete_qualify_project(
    predicates: &Conjuncts,
    project: &LogicalPlan,
    id_gen: &mut SlotIdGen,
) -> Option<LogicalPlan> {
    let LogicalPlan::Project {
        input,
        projections,
        distinct,
    } = project
    else {
        return None;
    };
    let output = project.output();
    let completion = Completion::collect(predicates, &project.output_set(), id_gen)?;

    let mut expanded = projections.clone();
    expanded.extend(completion.new_columns);
    let fragment = input
        .as_ref()
        .clone()
        .project(expanded)
        .qualify(completion.predicates)
        .project_slots(output.clone(), *distinct);
    Some(preserving_output(output, fragment))
}

/// Completes `Qualify(predicates) → Having → Project`.
///
/// Columns are collected as in [`complete_qualify_project`]. A non-distinct
/// projection becomes
///
/// ```text
/// Project(original output)
///   Having
///     Qualify(predicates over the new columns)
///       Project(original projections ++ new columns)
///         input
/// ```
///
/// A distinct projection must stay below the `Having`, so the columns the
/// `Having` reads but the projection does not produce are threaded through
/// a non-distinct projection between it and the `Qualify`:
///
/// ```text
/// Project(original output, distinct)
///   Having
///     Project(original output ++ having columns)
///       Qualify(predicates over the new columns)
///         Project(original projections ++ new columns ++ having columns)
///           input
/// ```
pub fn complete_qualify_having_project(
    predicates: &Conjuncts,
    having: &LogicalPlan,
    id_gen: &mut SlotIdGen,
) -> Option<LogicalPlan> {
    let LogicalPlan::Having {
        input: project,
        predicates: having_predicates,
    } = having
    else {
        return None;
    };
    let LogicalPlan::Project {
        input,
        projections,
        distinct,
    } = &**project
    else {
        return None;
    };
    let output = project.output();
    let available = project.output_set();
    let completion = Completion::collect(predicates, &available, id_gen)?;

    let mut expanded = projections.clone();
    expanded.extend(completion.new_columns);
    let inner = input.as_ref().clone();

    let fragment = if *distinct {
        let having_missing = having_predicates
            .iter()
            .flat_map(|p| p.input_slots())
            .filter(|slot| !available.contains(slot))
            .collect::<BTreeSet<_>>();
        for slot in having_missing.iter() {
            if !expanded.iter().any(|column| column.to_slot() == *slot) {
                expanded.push(NamedExpr::Slot(slot.clone()));
            }
        }
        let middle = output.iter().chain(having_missing.iter()).cloned().collect();
        inner
            .project(expanded)
            .qualify(completion.predicates)
            .project_slots(middle, false)
            .having(having_predicates.iter().cloned())
            .project_slots(output.clone(), true)
    } else {
        inner
            .project(expanded)
            .qualify(completion.predicates)
            .having(having_predicates.iter().cloned())
            .project_slots(output.clone(), false)
    };
    Some(preserving_output(output, fragment))
}

/// The columns a projection must add to evaluate some `Qualify` predicates.
#[derive(Debug)]
struct Completion {
    /// The predicates, with window function calls replaced by new columns.
    predicates: Conjuncts,
    /// Window aliases first, then pass-through columns.
    new_columns: Vec<NamedExpr>,
}

impl Completion {
    /// Returns `None` if `predicates` need nothing beyond `available`.
    fn collect(
        predicates: &Conjuncts,
        available: &BTreeSet<Slot>,
        id_gen: &mut SlotIdGen,
    ) -> Option<Self> {
        let mut windows = Vec::new();
        let mut rewritten = Conjuncts::new();
        for predicate in predicates {
            let (predicate, collected) = extract_windows(predicate.clone(), windows, id_gen);
            rewritten.insert(predicate);
            windows = collected;
        }

        // "Missing" is decided against the original predicates, so columns
        // read only by window arguments are passed through too.
        let absent = predicates
            .iter()
            .flat_map(|p| p.input_slots())
            .filter(|slot| !available.contains(slot))
            .collect::<BTreeSet<_>>();

        if windows.is_empty() && absent.is_empty() {
            return None;
        }
        let new_columns = windows
            .into_iter()
            .map(NamedExpr::Alias)
            .chain(absent.into_iter().map(NamedExpr::Slot))
            .collect();
        Some(Completion {
            predicates: rewritten,
            new_columns,
        })
    }
}

/// Replaces each window function call in `expr` with a reference to an alias
/// that computes it, appending new aliases to `aliases`.
///
/// Calls structurally equal to one already in `aliases` reuse its slot.
fn extract_windows(
    mut expr: ScalarExpr,
    mut aliases: Vec<Alias>,
    id_gen: &mut SlotIdGen,
) -> (ScalarExpr, Vec<Alias>) {
    if let ScalarExpr::Window(_) = expr {
        let slot = match aliases.iter().find(|alias| alias.expr == expr) {
            Some(alias) => alias.slot.clone(),
            None => {
                let alias = Alias::fresh_unnamed(expr, id_gen);
                let slot = alias.slot.clone();
                aliases.push(alias);
                slot
            }
        };
        return (ScalarExpr::Slot(slot), aliases);
    }
    expr.visit_mut_children(|child| {
        let (rewritten, collected) = extract_windows(child.take(), mem::take(&mut aliases), id_gen);
        *child = rewritten;
        aliases = collected;
    });
    (expr, aliases)
}
