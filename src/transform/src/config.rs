// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Settings for the transforms in this crate.

use serde::{Deserialize, Serialize};

/// Settings threaded through every transform via [`crate::TransformCtx`].
///
/// Missing fields take their default values when deserializing, so a
/// partially specified configuration is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// How many rounds a [`crate::Fixpoint`] may run before giving up.
    pub fixpoint_limit: usize,
    /// Enables [`crate::fill_up::FillUpQualifyMissingSlots`].
    pub enable_fill_up_qualify: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            fixpoint_limit: 100,
            enable_fill_up_qualify: true,
        }
    }
}
