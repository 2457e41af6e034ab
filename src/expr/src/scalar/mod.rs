// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::id::SlotId;

use self::func::{AggregateFunc, BinaryFunc, UnaryFunc, VariadicFunc, WindowFunc};

pub mod func;
pub mod named;

/// A set of boolean expressions that are implicitly AND-ed together.
///
/// The set is ordered by the structural order of [`ScalarExpr`], so two
/// conjunct sets are equal exactly when they contain the same predicates.
pub type Conjuncts = BTreeSet<ScalarExpr>;

/// A handle to a single output column of some plan node.
///
/// Slots compare, order, and hash by their [`SlotId`] alone; the name is
/// carried along for display purposes only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Slot {
    id: SlotId,
    name: String,
}

impl Slot {
    /// A handle to the column `id`, displayed as `name`.
    pub fn new(id: SlotId, name: impl Into<String>) -> Self {
        Slot {
            id,
            name: name.into(),
        }
    }

    /// The identity of the column.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// The display name of the column.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Slot {}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// A literal value.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum Datum {
    Null,
    False,
    True,
    Int64(i64),
    String(String),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("null"),
            Datum::False => f.write_str("false"),
            Datum::True => f.write_str("true"),
            Datum::Int64(i) => write!(f, "{}", i),
            Datum::String(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum ScalarExpr {
    /// A column produced by some plan node.
    Slot(Slot),
    /// A literal value.
    Literal(Datum),
    /// A function call that takes one expression as an argument.
    CallUnary {
        func: UnaryFunc,
        expr: Box<ScalarExpr>,
    },
    /// A function call that takes two expressions as arguments.
    CallBinary {
        func: BinaryFunc,
        expr1: Box<ScalarExpr>,
        expr2: Box<ScalarExpr>,
    },
    /// A function call that takes an arbitrary number of arguments.
    CallVariadic {
        func: VariadicFunc,
        exprs: Vec<ScalarExpr>,
    },
    /// An aggregate function call; only meaningful below a grouping.
    Aggregate(AggregateExpr),
    /// A window function call.
    Window(WindowExpr),
    /// A predicate over the result of a subquery.
    Subquery(SubqueryExpr),
}

/// Describes an aggregation expression.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct AggregateExpr {
    /// Names the aggregation function.
    pub func: AggregateFunc,
    /// An expression which extracts from each row the input to `func`.
    pub expr: Box<ScalarExpr>,
    /// Should the aggregation be applied only to distinct results in each group.
    pub distinct: bool,
}

/// Describes a window function call.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct WindowExpr {
    pub func: WindowFunc,
    pub args: Vec<ScalarExpr>,
    pub partition_by: Vec<ScalarExpr>,
    pub order_by: Vec<ScalarExpr>,
}

#[derive(Ord, PartialOrd, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum SubqueryKind {
    Exists,
    In,
    Scalar,
}

/// A predicate over the result of a subquery.
///
/// The subquery plan itself is owned by the binder and referenced here by an
/// opaque handle. The `correlated` slots are the outer columns the subquery
/// reads; a subquery without them can be evaluated once for all rows.
#[derive(Ord, PartialOrd, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct SubqueryExpr {
    pub kind: SubqueryKind,
    pub handle: u64,
    pub args: Vec<ScalarExpr>,
    pub correlated: Vec<Slot>,
}

impl ScalarExpr {
    /// A reference to `slot`.
    pub fn slot(slot: &Slot) -> Self {
        ScalarExpr::Slot(slot.clone())
    }

    /// The constant `datum`.
    pub fn literal(datum: Datum) -> Self {
        ScalarExpr::Literal(datum)
    }

    /// The constant `true`.
    pub fn literal_true() -> Self {
        ScalarExpr::Literal(Datum::True)
    }

    /// Applies `func` to `self` and `other`.
    pub fn call_binary(self, other: Self, func: BinaryFunc) -> Self {
        ScalarExpr::CallBinary {
            func,
            expr1: Box::new(self),
            expr2: Box::new(other),
        }
    }

    /// A call to the aggregate function `func` over `expr`.
    pub fn aggregate(func: AggregateFunc, expr: ScalarExpr, distinct: bool) -> Self {
        ScalarExpr::Aggregate(AggregateExpr {
            func,
            expr: Box::new(expr),
            distinct,
        })
    }

    /// A call to the window function `func`.
    pub fn window(
        func: WindowFunc,
        args: Vec<ScalarExpr>,
        partition_by: Vec<ScalarExpr>,
        order_by: Vec<ScalarExpr>,
    ) -> Self {
        ScalarExpr::Window(WindowExpr {
            func,
            args,
            partition_by,
            order_by,
        })
    }

    /// Conjoins `conjuncts` into a single expression.
    ///
    /// An empty input produces the literal `true`, and a single conjunct is
    /// returned as is.
    pub fn and_all<I>(conjuncts: I) -> Self
    where
        I: IntoIterator<Item = ScalarExpr>,
    {
        let mut exprs = conjuncts.into_iter().collect::<Vec<_>>();
        match exprs.len() {
            0 => ScalarExpr::literal_true(),
            1 => exprs.remove(0),
            _ => ScalarExpr::CallVariadic {
                func: VariadicFunc::And,
                exprs,
            },
        }
    }

    /// Decomposes nested `AND`s into their terms, dropping literal `true`s.
    pub fn conjuncts(&self) -> Vec<ScalarExpr> {
        let mut result = Vec::new();
        let mut todo = vec![self];
        while let Some(expr) = todo.pop() {
            match expr {
                ScalarExpr::CallVariadic {
                    func: VariadicFunc::And,
                    exprs,
                } => todo.extend(exprs.iter().rev()),
                ScalarExpr::Literal(Datum::True) => {}
                _ => result.push(expr.clone()),
            }
        }
        result
    }

    /// If `self` is `slot1 = slot2`, returns the two slots.
    pub fn as_slot_equality(&self) -> Option<(&Slot, &Slot)> {
        if let ScalarExpr::CallBinary {
            func: BinaryFunc::Eq,
            expr1,
            expr2,
        } = self
        {
            if let (ScalarExpr::Slot(s1), ScalarExpr::Slot(s2)) = (&**expr1, &**expr2) {
                return Some((s1, s2));
            }
        }
        None
    }

    /// Whether `self` is a subquery predicate that reads columns of the
    /// enclosing query.
    pub fn is_correlated_subquery(&self) -> bool {
        matches!(self, ScalarExpr::Subquery(subquery) if !subquery.correlated.is_empty())
    }

    pub fn visit_children<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Self),
    {
        match self {
            ScalarExpr::Slot(_) | ScalarExpr::Literal(_) => (),
            ScalarExpr::CallUnary { expr, .. } => f(expr),
            ScalarExpr::CallBinary { expr1, expr2, .. } => {
                f(expr1);
                f(expr2);
            }
            ScalarExpr::CallVariadic { exprs, .. } => {
                for expr in exprs {
                    f(expr);
                }
            }
            ScalarExpr::Aggregate(aggregate) => f(&aggregate.expr),
            ScalarExpr::Window(window) => {
                for expr in window
                    .args
                    .iter()
                    .chain(window.partition_by.iter())
                    .chain(window.order_by.iter())
                {
                    f(expr);
                }
            }
            ScalarExpr::Subquery(subquery) => {
                for expr in subquery.args.iter() {
                    f(expr);
                }
            }
        }
    }

    pub fn visit_mut_children<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Self),
    {
        match self {
            ScalarExpr::Slot(_) | ScalarExpr::Literal(_) => (),
            ScalarExpr::CallUnary { expr, .. } => f(expr),
            ScalarExpr::CallBinary { expr1, expr2, .. } => {
                f(expr1);
                f(expr2);
            }
            ScalarExpr::CallVariadic { exprs, .. } => {
                for expr in exprs {
                    f(expr);
                }
            }
            ScalarExpr::Aggregate(aggregate) => f(&mut aggregate.expr),
            ScalarExpr::Window(window) => {
                for expr in window
                    .args
                    .iter_mut()
                    .chain(window.partition_by.iter_mut())
                    .chain(window.order_by.iter_mut())
                {
                    f(expr);
                }
            }
            ScalarExpr::Subquery(subquery) => {
                for expr in subquery.args.iter_mut() {
                    f(expr);
                }
            }
        }
    }

    /// Post-order visitor.
    pub fn visit_post<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Self),
    {
        self.visit_children(|e| e.visit_post(f));
        f(self);
    }

    /// The slots `self` reads.
    ///
    /// For subqueries this includes the correlated slots, which are read
    /// from the enclosing query.
    pub fn input_slots(&self) -> BTreeSet<Slot> {
        let mut slots = BTreeSet::new();
        self.visit_post(&mut |e| match e {
            ScalarExpr::Slot(slot) => {
                slots.insert(slot.clone());
            }
            ScalarExpr::Subquery(subquery) => {
                slots.extend(subquery.correlated.iter().cloned());
            }
            _ => (),
        });
        slots
    }

    /// True if `self` is, or contains, an aggregate function call.
    pub fn contains_aggregate(&self) -> bool {
        if let ScalarExpr::Aggregate(_) = self {
            return true;
        }
        let mut found = false;
        self.visit_children(|child| found = found || child.contains_aggregate());
        found
    }

    /// True if `self` is, or contains, a window function call.
    pub fn contains_window(&self) -> bool {
        let mut found = false;
        self.visit_post(&mut |e| found = found || matches!(e, ScalarExpr::Window(_)));
        found
    }

    /// True if `self` contains a subquery.
    pub fn contains_subquery(&self) -> bool {
        let mut found = false;
        self.visit_post(&mut |e| found = found || matches!(e, ScalarExpr::Subquery(_)));
        found
    }

    /// Replaces every subexpression found among the keys of `map` by the
    /// associated value.
    ///
    /// Matching is top-down: once a subexpression is replaced, the
    /// replacement is not searched further.
    pub fn substitute(&mut self, map: &BTreeMap<ScalarExpr, ScalarExpr>) {
        if let Some(replacement) = map.get(self) {
            *self = replacement.clone();
        } else {
            self.visit_mut_children(|e| e.substitute(map));
        }
    }

    /// Like [`ScalarExpr::substitute`], but returns a new expression.
    pub fn substituted(&self, map: &BTreeMap<ScalarExpr, ScalarExpr>) -> Self {
        let mut expr = self.clone();
        expr.substitute(map);
        expr
    }

    /// Replaces `self` with the literal null and returns the original.
    pub fn take(&mut self) -> Self {
        mem::replace(self, ScalarExpr::Literal(Datum::Null))
    }
}

impl fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Slot(slot) => write!(f, "{}", slot),
            ScalarExpr::Literal(datum) => write!(f, "{}", datum),
            ScalarExpr::CallUnary {
                func: UnaryFunc::Neg,
                expr,
            } => write!(f, "-{}", expr),
            ScalarExpr::CallUnary { func, expr } => write!(f, "{}({})", func, expr),
            ScalarExpr::CallBinary { func, expr1, expr2 } => {
                write!(f, "({} {} {})", expr1, func, expr2)
            }
            ScalarExpr::CallVariadic {
                func: func @ (VariadicFunc::And | VariadicFunc::Or),
                exprs,
            } => write!(f, "({})", exprs.iter().join(&format!(" {} ", func))),
            ScalarExpr::CallVariadic { func, exprs } => {
                write!(f, "{}({})", func, exprs.iter().join(", "))
            }
            ScalarExpr::Aggregate(aggregate) => write!(f, "{}", aggregate),
            ScalarExpr::Window(window) => write!(f, "{}", window),
            ScalarExpr::Subquery(subquery) => write!(f, "{}", subquery),
        }
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.distinct {
            write!(f, "{}(distinct {})", self.func, self.expr)
        } else {
            write!(f, "{}({})", self.func, self.expr)
        }
    }
}

impl fmt::Display for WindowExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) over (", self.func, self.args.iter().join(", "))?;
        let mut clauses = Vec::new();
        if !self.partition_by.is_empty() {
            clauses.push(format!("partition by {}", self.partition_by.iter().join(", ")));
        }
        if !self.order_by.is_empty() {
            clauses.push(format!("order by {}", self.order_by.iter().join(", ")));
        }
        write!(f, "{})", clauses.join(" "))
    }
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SubqueryKind::Exists => "exists",
            SubqueryKind::In => "in",
            SubqueryKind::Scalar => "scalar",
        };
        write!(f, "{}[{}](subquery#{})", kind, self.args.iter().join(", "), self.handle)?;
        if !self.correlated.is_empty() {
            write!(f, " correlated [{}]", self.correlated.iter().join(", "))?;
        }
        Ok(())
    }
}
