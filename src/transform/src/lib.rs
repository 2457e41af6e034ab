// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Transformations and analyses of logical plans.
//!
//! The core trait is [`Transform`]; implementors rewrite a [`LogicalPlan`] in
//! place into an equivalent plan with the same output schema. Many of them can
//! be boxed and applied in sequence by an [`Optimizer`], and a [`Fixpoint`]
//! re-applies a group of transforms until the plan stops changing.
//!
//! Bottom-up analyses, most notably the effective predicates of each plan
//! node, live in [`analysis`].

#![deny(missing_debug_implementations)]

use std::fmt;

use quarry_expr::{LogicalPlan, SlotIdGen};

pub mod analysis;
pub mod config;
pub mod fill_up;

pub use config::TransformConfig;

/// Arguments that get threaded through all transforms.
#[derive(Debug)]
pub struct TransformCtx<'a> {
    /// The generator of fresh slots for columns synthesized by a rewrite.
    pub id_gen: &'a mut SlotIdGen,
    /// Settings that control which rewrites run and for how long.
    pub config: &'a TransformConfig,
}

impl<'a> TransformCtx<'a> {
    /// Context that allocates from `id_gen` and reads settings from `config`.
    pub fn new(id_gen: &'a mut SlotIdGen, config: &'a TransformConfig) -> Self {
        TransformCtx { id_gen, config }
    }
}

/// Types capable of transforming logical plans.
pub trait Transform: fmt::Debug {
    /// Transforms a plan into a functionally equivalent plan with the same
    /// output slots, in the same order.
    fn transform(
        &self,
        plan: &mut LogicalPlan,
        ctx: &mut TransformCtx,
    ) -> Result<(), TransformError>;

    /// A string describing the transform.
    ///
    /// This is useful mainly when iterating through many `Box<Transform>`
    /// and one wants to judge progress before some defect occurs.
    fn debug(&self) -> String {
        format!("{:?}", self)
    }
}

/// Errors that can occur during a transformation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// An unstructured error.
    #[error("internal transform error: {0}")]
    Internal(String),
    /// A [`Fixpoint`] kept changing the plan for its whole iteration budget.
    #[error("fixpoint {transform} did not converge within {limit} iterations")]
    FixpointLimit { transform: String, limit: usize },
}

/// A sequence of transformations iterated until the plan no longer changes.
///
/// The number of iterations is bounded by [`TransformConfig::fixpoint_limit`].
#[derive(Debug)]
pub struct Fixpoint {
    name: &'static str,
    transforms: Vec<Box<dyn Transform + Send>>,
}

impl Fixpoint {
    /// Iterates `transforms`, in order, under the name `name`.
    pub fn new(name: &'static str, transforms: Vec<Box<dyn Transform + Send>>) -> Self {
        Fixpoint { name, transforms }
    }
}

impl Transform for Fixpoint {
    #[tracing::instrument(
        target = "optimizer",
        level = "debug",
        skip_all,
        fields(path.segment = self.name)
    )]
    fn transform(
        &self,
        plan: &mut LogicalPlan,
        ctx: &mut TransformCtx,
    ) -> Result<(), TransformError> {
        let limit = ctx.config.fixpoint_limit;
        for iteration in 0..limit {
            let original = plan.clone();
            for transform in self.transforms.iter() {
                transform.transform(plan, ctx)?;
            }
            if *plan == original {
                tracing::trace!(target: "optimizer", iteration, "fixpoint reached");
                return Ok(());
            }
        }
        tracing::warn!(
            target: "optimizer",
            fixpoint = self.name,
            limit,
            plan = %plan,
            "fixpoint looped too many times"
        );
        Err(TransformError::FixpointLimit {
            transform: self.name.to_string(),
            limit,
        })
    }
}

/// Applies a list of transforms to a plan, in order.
#[derive(Debug)]
pub struct Optimizer {
    /// The list of transforms to apply to an input plan.
    pub transforms: Vec<Box<dyn Transform + Send>>,
}

impl Optimizer {
    /// Completes the inputs of every `Qualify` with the columns its
    /// predicates reference.
    pub fn qualify_completion() -> Self {
        let transforms: Vec<Box<dyn Transform + Send>> = vec![Box::new(Fixpoint::new(
            "fill_up_qualify",
            vec![Box::new(fill_up::FillUpQualifyMissingSlots)],
        ))];
        Optimizer { transforms }
    }

    /// Optimizes the supplied plan.
    ///
    /// Fresh slots are allocated above the largest slot id found in `plan`.
    pub fn optimize(
        &self,
        mut plan: LogicalPlan,
        config: &TransformConfig,
    ) -> Result<LogicalPlan, TransformError> {
        let first = plan.max_slot_id().map_or(0, |id| id.as_u64() + 1);
        let mut id_gen = SlotIdGen::starting_at(first);
        let mut ctx = TransformCtx::new(&mut id_gen, config);
        for transform in self.transforms.iter() {
            tracing::debug!(target: "optimizer", transform = %transform.debug(), "applying");
            transform.transform(&mut plan, &mut ctx)?;
        }
        Ok(plan)
    }
}
