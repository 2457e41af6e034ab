// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Identifiers for the columns produced by plan nodes.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// The identity of a column-producing site in a plan.
///
/// Two slots denote the same column if and only if their ids are equal.
/// Ids are handed out by a [`SlotIdGen`] and never reconstructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(u64);

impl SlotId {
    /// The raw numeric value of the identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SlotId {
    fn from(id: u64) -> Self {
        SlotId(id)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Manages the allocation of unique IDs.
#[derive(Debug, Default, Clone)]
pub struct Gen<Id: From<u64> + Default> {
    id: u64,
    phantom: PhantomData<Id>,
}

impl<Id: From<u64> + Default> Gen<Id> {
    /// A generator whose first allocated identifier is `first`.
    pub fn starting_at(first: u64) -> Self {
        Gen {
            id: first,
            phantom: PhantomData,
        }
    }

    /// Allocates a new identifier of type `Id` and advances the generator.
    pub fn allocate_id(&mut self) -> Id {
        let id = self.id;
        self.id += 1;
        id.into()
    }
}

/// A generator of fresh [`SlotId`]s.
pub type SlotIdGen = Gen<SlotId>;
