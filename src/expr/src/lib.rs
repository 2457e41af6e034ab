// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Core expression language.
//!
//! This crate defines the immutable trees the optimizer works on: scalar
//! expressions ([`ScalarExpr`]) built over column handles ([`Slot`]), and
//! logical query plans ([`LogicalPlan`]) whose nodes each declare an ordered
//! list of output slots.

#![warn(missing_debug_implementations)]

mod id;
mod relation;
mod scalar;

pub mod explain;

pub use id::{Gen, SlotId, SlotIdGen};
pub use relation::{JoinKind, LogicalPlan};
pub use scalar::func::{self, AggregateFunc, BinaryFunc, UnaryFunc, VariadicFunc, WindowFunc};
pub use scalar::named::{Alias, NamedExpr};
pub use scalar::{
    AggregateExpr, Conjuncts, Datum, ScalarExpr, Slot, SubqueryExpr, SubqueryKind, WindowExpr,
};
