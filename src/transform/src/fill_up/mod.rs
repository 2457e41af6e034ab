// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Supplies the columns a `Qualify` refers to but its input does not produce.
//!
//! A `Qualify` may be bound directly over the select list of a query, and so
//! refer to window function calls, aggregates, or input columns that the
//! select list never computes. Each rule in this module recognizes one shape
//! of operators beneath a `Qualify`, widens the operator that computes the
//! select list with the missing columns, and re-projects the original columns
//! on top, so that ancestors observe exactly the schema they did before.
//!
//! The rules are exposed as free functions that return `None` when nothing is
//! missing, and are applied throughout a plan by [`FillUpQualifyMissingSlots`].

use quarry_expr::{LogicalPlan, Slot, SlotIdGen};

use crate::{TransformCtx, TransformError};

mod aggregate;
mod project;

pub use aggregate::{complete_qualify_aggregate, complete_qualify_having_aggregate};
pub use project::{complete_qualify_having_project, complete_qualify_project};

/// Completes the input of every `Qualify` with the columns it references.
#[derive(Debug, Default)]
pub struct FillUpQualifyMissingSlots;

impl crate::Transform for FillUpQualifyMissingSlots {
    #[tracing::instrument(
        target = "optimizer",
        level = "trace",
        skip_all,
        fields(path.segment = "fill_up_qualify")
    )]
    fn transform(
        &self,
        plan: &mut LogicalPlan,
        ctx: &mut TransformCtx,
    ) -> Result<(), TransformError> {
        if !ctx.config.enable_fill_up_qualify {
            return Ok(());
        }
        plan.try_visit_mut_pre(&mut |e| {
            if let Some(completed) = self.action(e, ctx.id_gen) {
                *e = completed;
            }
            Ok(())
        })
    }
}

impl FillUpQualifyMissingSlots {
    /// Returns the completed replacement for `plan` if it is a `Qualify` over
    /// a supported shape whose input lacks referenced columns.
    pub fn action(&self, plan: &LogicalPlan, id_gen: &mut SlotIdGen) -> Option<LogicalPlan> {
        let LogicalPlan::Qualify { input, predicates } = plan else {
            return None;
        };
        match &**input {
            LogicalPlan::Having { input: inner, .. } => match &**inner {
                LogicalPlan::Aggregate { .. } => {
                    complete_qualify_having_aggregate(predicates, input, id_gen)
                }
                LogicalPlan::Project { .. } => {
                    complete_qualify_having_project(predicates, input, id_gen)
                }
                _ => None,
            },
            LogicalPlan::Aggregate { .. } => complete_qualify_aggregate(predicates, input, id_gen),
            LogicalPlan::Project { .. } => complete_qualify_project(predicates, input, id_gen),
            _ => None,
        }
    }
}

/// Panics unless `fragment` produces exactly `output`.
fn preserving_output(output: Vec<Slot>, fragment: LogicalPlan) -> LogicalPlan {
    assert_eq!(
        output,
        fragment.output(),
        "completing a qualify changed its output schema:\n{}",
        fragment
    );
    tracing::debug!(target: "optimizer", fragment = %fragment, "completed qualify input");
    fragment
}
