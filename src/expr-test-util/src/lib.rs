// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Helpers for building [`LogicalPlan`]s and [`ScalarExpr`]s in tests.
//!
//! Tests refer to columns by name. A [`TestCatalog`] hands out a fresh slot
//! for every column it creates and remembers it under its name, so that a
//! test can write `catalog.col("a")` instead of threading slots around.

use std::collections::BTreeMap;

use quarry_expr::{
    AggregateFunc, Alias, BinaryFunc, Datum, LogicalPlan, NamedExpr, ScalarExpr, Slot,
    SlotIdGen, WindowFunc,
};

/// Tracks the columns created by a test.
#[derive(Debug)]
pub struct TestCatalog {
    id_gen: SlotIdGen,
    slots: BTreeMap<String, Slot>,
}

impl Default for TestCatalog {
    fn default() -> Self {
        TestCatalog {
            id_gen: SlotIdGen::starting_at(1),
            slots: BTreeMap::new(),
        }
    }
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A base relation `name` with a fresh slot for each of `columns`.
    ///
    /// Panics if a column name is already in use.
    pub fn table(&mut self, name: &str, columns: &[&str]) -> LogicalPlan {
        let output = columns.iter().map(|column| self.fresh(column)).collect();
        LogicalPlan::get(name, output)
    }

    /// A projection entry computing `expr` into a fresh column `name`.
    pub fn alias(&mut self, name: &str, expr: ScalarExpr) -> NamedExpr {
        let slot = self.fresh(name);
        NamedExpr::Alias(Alias { slot, expr })
    }

    /// The slot registered under `name`.
    pub fn slot(&self, name: &str) -> Slot {
        match self.slots.get(name) {
            Some(slot) => slot.clone(),
            None => panic!("unknown column {}", name),
        }
    }

    /// A reference to the column registered under `name`.
    pub fn col(&self, name: &str) -> ScalarExpr {
        ScalarExpr::slot(&self.slot(name))
    }

    /// Pass-through projection entries for the named columns.
    pub fn cols(&self, names: &[&str]) -> Vec<NamedExpr> {
        names
            .iter()
            .map(|name| NamedExpr::Slot(self.slot(name)))
            .collect()
    }

    /// The generator used for all slots created so far.
    ///
    /// Transforms run in a test should allocate from this generator, so that
    /// the slots they synthesize never collide with the test's own.
    pub fn id_gen(&mut self) -> &mut SlotIdGen {
        &mut self.id_gen
    }

    fn fresh(&mut self, name: &str) -> Slot {
        let slot = Slot::new(self.id_gen.allocate_id(), name);
        let prior = self.slots.insert(name.to_string(), slot.clone());
        assert!(prior.is_none(), "column {} defined twice", name);
        slot
    }
}

pub fn lit(value: i64) -> ScalarExpr {
    ScalarExpr::literal(Datum::Int64(value))
}

pub fn eq(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
    left.call_binary(right, BinaryFunc::Eq)
}

pub fn gt(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
    left.call_binary(right, BinaryFunc::Gt)
}

pub fn lt(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
    left.call_binary(right, BinaryFunc::Lt)
}

pub fn add(left: ScalarExpr, right: ScalarExpr) -> ScalarExpr {
    left.call_binary(right, BinaryFunc::Add)
}

pub fn sum(expr: ScalarExpr) -> ScalarExpr {
    ScalarExpr::aggregate(AggregateFunc::Sum, expr, false)
}

pub fn count(expr: ScalarExpr) -> ScalarExpr {
    ScalarExpr::aggregate(AggregateFunc::Count, expr, false)
}

/// `rank() over (partition by ... order by ...)`.
pub fn rank(partition_by: Vec<ScalarExpr>, order_by: Vec<ScalarExpr>) -> ScalarExpr {
    ScalarExpr::window(WindowFunc::Rank, vec![], partition_by, order_by)
}

/// `row_number() over (partition by ... order by ...)`.
pub fn row_number(partition_by: Vec<ScalarExpr>, order_by: Vec<ScalarExpr>) -> ScalarExpr {
    ScalarExpr::window(WindowFunc::RowNumber, vec![], partition_by, order_by)
}
