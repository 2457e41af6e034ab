// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Traits and types for analyses of [`LogicalPlan`]s.
//!
//! An [`Analysis`] associates a value with every node of a plan, derived from
//! the node itself and the values of its children. [`derive`] visits the
//! plan once, bottom up, and records the values in post-order.

use std::fmt;

use quarry_expr::LogicalPlan;

pub mod effective_predicates;
pub mod inference;

pub use effective_predicates::{extract_effective_predicates, EffectivePredicates};
pub use inference::{EqualityPropagation, InferenceOracle, NoInference};

/// An analysis that can be applied bottom-up to a `LogicalPlan`.
pub trait Analysis {
    /// The type of value this analysis associates with a plan node.
    type Value: fmt::Debug;

    /// The value derived for `plan`, given the values of its children in
    /// left-to-right order.
    fn derive(&self, plan: &LogicalPlan, children: &[&Self::Value]) -> Self::Value;
}

/// The values of one analysis for every node of a plan, in post-order.
#[derive(Debug)]
pub struct Derived<V> {
    results: Vec<V>,
    /// The number of nodes in the subtree rooted at each position.
    sizes: Vec<usize>,
}

impl<V> Derived<V> {
    /// The value for each node, in post-order.
    pub fn results(&self) -> &[V] {
        &self.results
    }

    /// The value for the root of the plan.
    pub fn root(&self) -> Option<&V> {
        self.results.last()
    }

    pub fn into_root(mut self) -> Option<V> {
        self.results.pop()
    }

    /// The positions of the children of the node at `index`, last child first.
    ///
    /// `count` must be the number of children of that node.
    pub fn children_rev(&self, index: usize, count: usize) -> impl Iterator<Item = usize> + '_ {
        children_of_rev(&self.sizes, index, count)
    }
}

/// Walks a subtree layout backwards from its root at `start`.
///
/// In post-order the last child of a node immediately precedes it, and each
/// earlier child immediately precedes the subtree of its right sibling.
fn children_of_rev(
    sizes: &[usize],
    start: usize,
    count: usize,
) -> impl Iterator<Item = usize> + '_ {
    (0..count).scan(start, move |offset, _| {
        let child = *offset - 1;
        *offset -= sizes[child];
        Some(child)
    })
}

/// Applies `analysis` to every node of `plan`, children before parents.
pub fn derive<A: Analysis>(analysis: &A, plan: &LogicalPlan) -> Derived<A::Value> {
    // Each node, followed by its children in reverse order.
    let mut todo = vec![plan];
    let mut rev_post_order = Vec::new();
    while let Some(plan) = todo.pop() {
        todo.extend(plan.children());
        rev_post_order.push(plan);
    }
    rev_post_order.reverse();

    let mut results: Vec<A::Value> = Vec::with_capacity(rev_post_order.len());
    let mut sizes = Vec::with_capacity(rev_post_order.len());
    for (index, plan) in rev_post_order.into_iter().enumerate() {
        let children = children_of_rev(&sizes, index, plan.children().len())
            .collect::<Vec<_>>();
        let value = {
            let values = children.iter().rev().map(|c| &results[*c]).collect::<Vec<_>>();
            analysis.derive(plan, &values)
        };
        sizes.push(1 + children.iter().map(|c| sizes[*c]).sum::<usize>());
        results.push(value);
    }
    Derived { results, sizes }
}
