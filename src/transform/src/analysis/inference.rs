// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Derivation of predicates entailed by other predicates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use quarry_expr::{BinaryFunc, Conjuncts, ScalarExpr, Slot};

/// Derives predicates that follow from a set of predicates.
///
/// Implementations must be sound: every returned predicate holds for any row
/// satisfying all of the input predicates.
pub trait InferenceOracle: fmt::Debug + Send + Sync {
    /// Predicates entailed by `predicates`.
    ///
    /// The result need not, and ideally does not, repeat `predicates`;
    /// callers take the union.
    fn infer(&self, predicates: &Conjuncts) -> Conjuncts;
}

/// Infers nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInference;

impl InferenceOracle for NoInference {
    fn infer(&self, _predicates: &Conjuncts) -> Conjuncts {
        Conjuncts::new()
    }
}

/// Propagates facts along equalities between columns.
///
/// Columns related by `a = b` predicates form equivalence classes. The oracle
/// infers the equalities between members of a class that are not already
/// stated, and restates each predicate over a single column for every other
/// column of its class: from `x = y` and `x = 1` it infers `y = 1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EqualityPropagation;

impl InferenceOracle for EqualityPropagation {
    fn infer(&self, predicates: &Conjuncts) -> Conjuncts {
        let mut classes = EquivalenceClasses::default();
        for (slot1, slot2) in predicates.iter().filter_map(ScalarExpr::as_slot_equality) {
            classes.union(slot1, slot2);
        }
        let classes = classes.classes();
        let class_of = |slot: &Slot| classes.iter().find(|class| class.contains(slot));

        let mut inferred = Conjuncts::new();
        for class in classes.iter() {
            for (slot1, slot2) in class.iter().tuple_combinations() {
                let forward = equality(slot1, slot2);
                if !predicates.contains(&forward) && !predicates.contains(&equality(slot2, slot1)) {
                    inferred.insert(forward);
                }
            }
        }

        for predicate in predicates {
            if predicate.as_slot_equality().is_some()
                || predicate.contains_aggregate()
                || predicate.contains_window()
                || predicate.contains_subquery()
            {
                continue;
            }
            let slots = predicate.input_slots();
            let Some(slot) = slots.first().filter(|_| slots.len() == 1) else {
                continue;
            };
            let Some(class) = class_of(slot) else {
                continue;
            };
            for other in class.iter().filter(|other| *other != slot) {
                let map = [(ScalarExpr::slot(slot), ScalarExpr::slot(other))]
                    .into_iter()
                    .collect::<BTreeMap<_, _>>();
                let restated = predicate.substituted(&map);
                if !predicates.contains(&restated) {
                    inferred.insert(restated);
                }
            }
        }

        tracing::trace!(
            target: "optimizer",
            classes = classes.len(),
            inferred = inferred.len(),
            "equality propagation"
        );
        inferred
    }
}

fn equality(slot1: &Slot, slot2: &Slot) -> ScalarExpr {
    ScalarExpr::slot(slot1).call_binary(ScalarExpr::slot(slot2), BinaryFunc::Eq)
}

/// A union-find structure over slots.
#[derive(Debug, Default)]
struct EquivalenceClasses {
    /// Maps each slot that is not the representative of its class to a slot
    /// closer to the representative.
    parents: BTreeMap<Slot, Slot>,
    members: BTreeSet<Slot>,
}

impl EquivalenceClasses {
    fn find<'a>(&'a self, mut slot: &'a Slot) -> &'a Slot {
        while let Some(parent) = self.parents.get(slot) {
            slot = parent;
        }
        slot
    }

    fn union(&mut self, slot1: &Slot, slot2: &Slot) {
        self.members.insert(slot1.clone());
        self.members.insert(slot2.clone());
        let root1 = self.find(slot1).clone();
        let root2 = self.find(slot2).clone();
        if root1 < root2 {
            self.parents.insert(root2, root1);
        } else if root2 < root1 {
            self.parents.insert(root1, root2);
        }
    }

    /// The classes with at least two members.
    fn classes(&self) -> Vec<BTreeSet<Slot>> {
        let mut classes = BTreeMap::<&Slot, BTreeSet<Slot>>::new();
        for member in self.members.iter() {
            classes
                .entry(self.find(member))
                .or_default()
                .insert(member.clone());
        }
        classes
            .into_values()
            .filter(|class| class.len() > 1)
            .collect()
    }
}
