// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![deny(missing_docs)]

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::SlotId;
use crate::scalar::named::NamedExpr;
use crate::scalar::{Conjuncts, ScalarExpr, Slot};

/// The ways in which two inputs of a [`LogicalPlan::Join`] can be combined.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
pub enum JoinKind {
    /// Pairs of matching rows.
    Inner,
    /// All pairs of rows.
    Cross,
    /// Matching pairs, plus left rows without a match padded with nulls.
    LeftOuter,
    /// Matching pairs, plus right rows without a match padded with nulls.
    RightOuter,
    /// Matching pairs, plus unmatched rows of either side padded with nulls.
    FullOuter,
    /// Left rows with at least one match.
    LeftSemi,
    /// Right rows with at least one match.
    RightSemi,
    /// Left rows without a match.
    LeftAnti,
    /// Right rows without a match.
    RightAnti,
    /// Left rows without a match, where a null comparison counts as a match.
    NullAwareLeftAnti,
}

impl JoinKind {
    /// Whether the join exposes the columns of its left input.
    pub fn outputs_left(&self) -> bool {
        !matches!(self, JoinKind::RightSemi | JoinKind::RightAnti)
    }

    /// Whether the join exposes the columns of its right input.
    pub fn outputs_right(&self) -> bool {
        !matches!(
            self,
            JoinKind::LeftSemi | JoinKind::LeftAnti | JoinKind::NullAwareLeftAnti
        )
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinKind::Inner => "inner",
            JoinKind::Cross => "cross",
            JoinKind::LeftOuter => "left outer",
            JoinKind::RightOuter => "right outer",
            JoinKind::FullOuter => "full outer",
            JoinKind::LeftSemi => "left semi",
            JoinKind::RightSemi => "right semi",
            JoinKind::LeftAnti => "left anti",
            JoinKind::RightAnti => "right anti",
            JoinKind::NullAwareLeftAnti => "null aware left anti",
        })
    }
}

/// A logical query plan.
///
/// Every node declares an ordered list of output slots (see
/// [`LogicalPlan::output`]); those slots are exactly the columns an ancestor
/// may refer to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogicalPlan {
    /// Read a base relation.
    Get {
        /// The name of the relation.
        name: String,
        /// The columns of the relation.
        output: Vec<Slot>,
    },
    /// Compute a list of named expressions for each input row.
    Project {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// The output columns, in order.
        projections: Vec<NamedExpr>,
        /// Whether duplicate output rows are removed.
        distinct: bool,
    },
    /// Group the input and compute aggregates over each group.
    Aggregate {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// Expressions used to form groups.
        group_key: Vec<ScalarExpr>,
        /// The output columns, in order. May wrap aggregate function calls.
        outputs: Vec<NamedExpr>,
    },
    /// Keep rows for which all predicates hold, below any grouping.
    Filter {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// Predicates, each of which must be true.
        predicates: Conjuncts,
    },
    /// Keep rows for which all predicates hold, after grouping.
    Having {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// Predicates, each of which must be true.
        predicates: Conjuncts,
    },
    /// Keep rows for which all predicates hold, after window functions.
    Qualify {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// Predicates, each of which must be true.
        predicates: Conjuncts,
    },
    /// Combine two collections.
    Join {
        /// The left input.
        left: Box<LogicalPlan>,
        /// The right input.
        right: Box<LogicalPlan>,
        /// How rows of the inputs are combined.
        kind: JoinKind,
        /// The join condition, if any.
        on: Option<ScalarExpr>,
    },
    /// Skip `offset` rows, then keep at most `limit` rows.
    Limit {
        /// The source collection.
        input: Box<LogicalPlan>,
        /// The maximum number of rows to produce.
        limit: u64,
        /// The number of rows to skip.
        offset: u64,
    },
}

impl LogicalPlan {
    /// Reads the base relation `name` with the given columns.
    pub fn get(name: impl Into<String>, output: Vec<Slot>) -> Self {
        LogicalPlan::Get {
            name: name.into(),
            output,
        }
    }

    /// Computes `projections` for each row.
    pub fn project(self, projections: Vec<NamedExpr>) -> Self {
        LogicalPlan::Project {
            input: Box::new(self),
            projections,
            distinct: false,
        }
    }

    /// Computes `projections` for each row and removes duplicates.
    pub fn project_distinct(self, projections: Vec<NamedExpr>) -> Self {
        LogicalPlan::Project {
            input: Box::new(self),
            projections,
            distinct: true,
        }
    }

    /// Retains only the columns in `slots`, in that order.
    pub fn project_slots(self, slots: Vec<Slot>, distinct: bool) -> Self {
        LogicalPlan::Project {
            input: Box::new(self),
            projections: slots.into_iter().map(NamedExpr::Slot).collect(),
            distinct,
        }
    }

    /// Groups by `group_key` and computes `outputs` for each group.
    pub fn aggregate(self, group_key: Vec<ScalarExpr>, outputs: Vec<NamedExpr>) -> Self {
        LogicalPlan::Aggregate {
            input: Box::new(self),
            group_key,
            outputs,
        }
    }

    /// Retains only the rows satisfying each of several predicates.
    pub fn filter<I>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = ScalarExpr>,
    {
        LogicalPlan::Filter {
            input: Box::new(self),
            predicates: predicates.into_iter().collect(),
        }
    }

    /// Retains only the grouped rows satisfying each of several predicates.
    pub fn having<I>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = ScalarExpr>,
    {
        LogicalPlan::Having {
            input: Box::new(self),
            predicates: predicates.into_iter().collect(),
        }
    }

    /// Retains only the rows whose window results satisfy each of several predicates.
    pub fn qualify<I>(self, predicates: I) -> Self
    where
        I: IntoIterator<Item = ScalarExpr>,
    {
        LogicalPlan::Qualify {
            input: Box::new(self),
            predicates: predicates.into_iter().collect(),
        }
    }

    /// Combines `self` and `right` according to `kind`.
    pub fn join(self, right: Self, kind: JoinKind, on: Option<ScalarExpr>) -> Self {
        LogicalPlan::Join {
            left: Box::new(self),
            right: Box::new(right),
            kind,
            on,
        }
    }

    /// Keeps at most `limit` rows.
    pub fn limit(self, limit: u64) -> Self {
        LogicalPlan::Limit {
            input: Box::new(self),
            limit,
            offset: 0,
        }
    }

    /// The ordered list of slots this node produces.
    pub fn output(&self) -> Vec<Slot> {
        match self {
            LogicalPlan::Get { output, .. } => output.clone(),
            LogicalPlan::Project { projections, .. } => {
                projections.iter().map(NamedExpr::to_slot).collect()
            }
            LogicalPlan::Aggregate { outputs, .. } => {
                outputs.iter().map(NamedExpr::to_slot).collect()
            }
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Having { input, .. }
            | LogicalPlan::Qualify { input, .. }
            | LogicalPlan::Limit { input, .. } => input.output(),
            LogicalPlan::Join {
                left, right, kind, ..
            } => {
                let mut output = Vec::new();
                if kind.outputs_left() {
                    output.extend(left.output());
                }
                if kind.outputs_right() {
                    output.extend(right.output());
                }
                output
            }
        }
    }

    /// The slots this node produces, as a set.
    pub fn output_set(&self) -> BTreeSet<Slot> {
        self.output().into_iter().collect()
    }

    /// The immediate inputs of this node, left to right.
    pub fn children(&self) -> Vec<&LogicalPlan> {
        let mut children = Vec::new();
        self.visit_children(|child| children.push(child));
        children
    }

    /// Applies `f` to each child `LogicalPlan`.
    pub fn visit_children<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a Self),
    {
        match self {
            LogicalPlan::Get { .. } => (),
            LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Having { input, .. }
            | LogicalPlan::Qualify { input, .. }
            | LogicalPlan::Limit { input, .. } => f(input),
            LogicalPlan::Join { left, right, .. } => {
                f(left);
                f(right);
            }
        }
    }

    /// Applies `f` to each child `LogicalPlan`.
    pub fn visit_mut_children<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Self),
    {
        match self {
            LogicalPlan::Get { .. } => (),
            LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Having { input, .. }
            | LogicalPlan::Qualify { input, .. }
            | LogicalPlan::Limit { input, .. } => f(input),
            LogicalPlan::Join { left, right, .. } => {
                f(left);
                f(right);
            }
        }
    }

    /// Post-order visitor for each `LogicalPlan`.
    pub fn visit_post<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Self),
    {
        self.visit_children(|e| e.visit_post(f));
        f(self);
    }

    /// Fallible pre-order visitor for each `LogicalPlan`.
    pub fn try_visit_mut_pre<F, E>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut Self) -> Result<(), E>,
    {
        f(self)?;
        let mut result = Ok(());
        self.visit_mut_children(|e| {
            if result.is_ok() {
                result = e.try_visit_mut_pre(f);
            }
        });
        result
    }

    /// The scalar expressions held directly by this node.
    pub fn expressions(&self) -> Vec<&ScalarExpr> {
        match self {
            LogicalPlan::Get { .. } | LogicalPlan::Limit { .. } => Vec::new(),
            LogicalPlan::Project { projections, .. } => projections
                .iter()
                .filter_map(|p| p.as_alias().map(|alias| &alias.expr))
                .collect(),
            LogicalPlan::Aggregate {
                group_key, outputs, ..
            } => group_key
                .iter()
                .chain(outputs.iter().filter_map(|o| o.as_alias().map(|alias| &alias.expr)))
                .collect(),
            LogicalPlan::Filter { predicates, .. }
            | LogicalPlan::Having { predicates, .. }
            | LogicalPlan::Qualify { predicates, .. } => predicates.iter().collect(),
            LogicalPlan::Join { on, .. } => on.iter().collect(),
        }
    }

    /// The largest slot id produced or referenced anywhere in the plan.
    ///
    /// Callers use this to seed a generator of fresh slots for the plan.
    pub fn max_slot_id(&self) -> Option<SlotId> {
        let mut max = None;
        self.visit_post(&mut |plan| {
            let produced = plan.output().into_iter();
            let referenced = plan
                .expressions()
                .into_iter()
                .flat_map(|e| e.input_slots().into_iter());
            for slot in produced.chain(referenced) {
                max = max.max(Some(slot.id()));
            }
        });
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_tags() {
        let a = Slot::new(SlotId::from(1), "a");
        let plan = LogicalPlan::get("t", vec![a.clone()]).limit(5);

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["limit"]["limit"], 5);
        assert_eq!(json["limit"]["input"]["get"]["name"], "t");

        let parsed: LogicalPlan = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, plan);
        assert_eq!(parsed.max_slot_id(), Some(a.id()));
    }

    #[test]
    fn semi_and_anti_joins_expose_one_side() {
        let t = LogicalPlan::get("t", vec![Slot::new(SlotId::from(1), "a")]);
        let u = LogicalPlan::get("u", vec![Slot::new(SlotId::from(2), "b")]);
        let output = |kind| t.clone().join(u.clone(), kind, None).output();
        assert_eq!(output(JoinKind::LeftOuter), [t.output(), u.output()].concat());
        assert_eq!(output(JoinKind::NullAwareLeftAnti), t.output());
        assert_eq!(output(JoinKind::RightSemi), u.output());
    }
}
