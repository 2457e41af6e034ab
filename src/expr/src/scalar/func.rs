// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Functions that can appear in scalar expressions.
//!
//! The optimizer never evaluates these functions. It compares them
//! structurally and prints them, so each one carries only its name.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum UnaryFunc {
    Not,
    IsNull,
    IsTrue,
    Neg,
}

impl fmt::Display for UnaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryFunc::Not => f.write_str("not"),
            UnaryFunc::IsNull => f.write_str("isnull"),
            UnaryFunc::IsTrue => f.write_str("istrue"),
            UnaryFunc::Neg => f.write_str("-"),
        }
    }
}

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum BinaryFunc {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryFunc::Eq => "=",
            BinaryFunc::NotEq => "!=",
            BinaryFunc::Lt => "<",
            BinaryFunc::Lte => "<=",
            BinaryFunc::Gt => ">",
            BinaryFunc::Gte => ">=",
            BinaryFunc::Add => "+",
            BinaryFunc::Sub => "-",
            BinaryFunc::Mul => "*",
            BinaryFunc::Div => "/",
        })
    }
}

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum VariadicFunc {
    And,
    Or,
    Coalesce,
}

impl fmt::Display for VariadicFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariadicFunc::And => f.write_str("AND"),
            VariadicFunc::Or => f.write_str("OR"),
            VariadicFunc::Coalesce => f.write_str("coalesce"),
        }
    }
}

/// Functions that fold a group of rows into a single value.
#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::Avg => "avg",
        })
    }
}

/// Functions evaluated over a window of rows around the current row.
#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum WindowFunc {
    RowNumber,
    Rank,
    DenseRank,
    Lag,
    Lead,
    /// An aggregate function computed over the window frame.
    Aggregate(AggregateFunc),
}

impl fmt::Display for WindowFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowFunc::RowNumber => f.write_str("row_number"),
            WindowFunc::Rank => f.write_str("rank"),
            WindowFunc::DenseRank => f.write_str("dense_rank"),
            WindowFunc::Lag => f.write_str("lag"),
            WindowFunc::Lead => f.write_str("lead"),
            WindowFunc::Aggregate(func) => func.fmt(f),
        }
    }
}
