// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Expressions that produce a named output column.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::SlotIdGen;
use crate::scalar::{ScalarExpr, Slot};

/// An expression bound to the slot it produces.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct Alias {
    /// The slot through which ancestors refer to the value of `expr`.
    pub slot: Slot,
    /// The producing expression.
    pub expr: ScalarExpr,
}

impl Alias {
    /// Binds `expr` to a freshly allocated slot named `name`.
    pub fn fresh(expr: ScalarExpr, name: impl Into<String>, id_gen: &mut SlotIdGen) -> Self {
        Alias {
            slot: Slot::new(id_gen.allocate_id(), name),
            expr,
        }
    }

    /// Binds `expr` to a fresh slot named after the expression itself.
    pub fn fresh_unnamed(expr: ScalarExpr, id_gen: &mut SlotIdGen) -> Self {
        let name = expr.to_string();
        Alias::fresh(expr, name, id_gen)
    }
}

/// An entry of a projection or aggregate output list.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum NamedExpr {
    /// Passes an input column through unchanged.
    Slot(Slot),
    /// Computes a new column.
    Alias(Alias),
}

impl NamedExpr {
    /// The slot produced by this output column.
    pub fn to_slot(&self) -> Slot {
        match self {
            NamedExpr::Slot(slot) => slot.clone(),
            NamedExpr::Alias(alias) => alias.slot.clone(),
        }
    }

    /// The expression computing the column, with any enclosing alias stripped.
    pub fn expr(&self) -> ScalarExpr {
        match self {
            NamedExpr::Slot(slot) => ScalarExpr::Slot(slot.clone()),
            NamedExpr::Alias(alias) => alias.expr.clone(),
        }
    }

    pub fn as_alias(&self) -> Option<&Alias> {
        if let NamedExpr::Alias(alias) = self {
            Some(alias)
        } else {
            None
        }
    }

    /// The slots read to compute this column.
    pub fn input_slots(&self) -> BTreeSet<Slot> {
        match self {
            NamedExpr::Slot(slot) => [slot.clone()].into_iter().collect(),
            NamedExpr::Alias(alias) => alias.expr.input_slots(),
        }
    }
}

impl From<Slot> for NamedExpr {
    fn from(slot: Slot) -> Self {
        NamedExpr::Slot(slot)
    }
}

impl From<Alias> for NamedExpr {
    fn from(alias: Alias) -> Self {
        NamedExpr::Alias(alias)
    }
}

impl fmt::Display for NamedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedExpr::Slot(slot) => write!(f, "{}", slot),
            NamedExpr::Alias(alias) => write!(f, "{} AS {}", alias.expr, alias.slot),
        }
    }
}
