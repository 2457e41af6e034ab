// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! `EXPLAIN` support for structures defined in this crate.
//!
//! Plans render as an indented tree, one operator per line, children below
//! their parent. The layout uses hard line breaks only, so the output does
//! not depend on the rendering width.

use std::fmt;

use itertools::Itertools;
use pretty::RcDoc;

use crate::relation::LogicalPlan;

/// The width passed to the layout engine; only soft breaks would consult it.
const RENDER_WIDTH: usize = 100;

/// Convert the arguments into a [`pretty::RcDoc`], appending each in turn to
/// an initially empty document. Anything [`pretty::Pretty`] may be passed:
/// documents, strings, and string slices.
#[macro_export]
macro_rules! to_doc {
    ($($rest: expr),*) => {{
        let mut doc = ::pretty::RcDoc::<()>::nil();
        $(
            doc = doc.append($rest);
        )*
        doc
    }}
}

impl LogicalPlan {
    /// Formats the `LogicalPlan` as a document.
    pub fn to_doc(&self) -> RcDoc<'_, ()> {
        let mut doc = RcDoc::text(self.header());
        for child in self.children() {
            doc = doc.append(to_doc!(RcDoc::hardline(), child.to_doc()).nest(2));
        }
        doc
    }

    /// Renders the plan as an indented tree.
    pub fn pretty(&self) -> String {
        self.to_string()
    }

    /// The single-line description of this node, without its inputs.
    fn header(&self) -> String {
        match self {
            LogicalPlan::Get { name, output } => {
                format!("Get {} [{}]", name, output.iter().join(", "))
            }
            LogicalPlan::Project {
                projections,
                distinct,
                ..
            } => {
                let distinct = if *distinct { " distinct" } else { "" };
                format!("Project{} [{}]", distinct, projections.iter().join(", "))
            }
            LogicalPlan::Aggregate {
                group_key, outputs, ..
            } => format!(
                "Aggregate group_key=[{}] outputs=[{}]",
                group_key.iter().join(", "),
                outputs.iter().join(", ")
            ),
            LogicalPlan::Filter { predicates, .. } => {
                format!("Filter [{}]", predicates.iter().join(", "))
            }
            LogicalPlan::Having { predicates, .. } => {
                format!("Having [{}]", predicates.iter().join(", "))
            }
            LogicalPlan::Qualify { predicates, .. } => {
                format!("Qualify [{}]", predicates.iter().join(", "))
            }
            LogicalPlan::Join { kind, on, .. } => match on {
                Some(on) => format!("Join {} on={}", kind, on),
                None => format!("Join {}", kind),
            },
            LogicalPlan::Limit { limit, offset, .. } => {
                format!("Limit {} offset={}", limit, offset)
            }
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_doc().render_fmt(RENDER_WIDTH, f)
    }
}
