// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fastener errors.

use crate::id::FastenerId;

/// Error returned by fastener reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FastenerError {
    /// A required slot has no value anywhere in its resolution chain.
    #[error("fastener `{name}` has no value")]
    MissingValue {
        /// Registered name of the fastener.
        name: &'static str,
    },
    /// The owner's class does not declare the fastener.
    #[error("fastener `{name}` is not declared by the owner's class")]
    NotDeclared {
        /// Registered name of the fastener.
        name: &'static str,
    },
    /// The handle's value type differs from the registered one.
    #[error("fastener `{name}` was registered with a different value type")]
    TypeMismatch {
        /// Registered name of the fastener.
        name: &'static str,
    },
    /// The id was never registered.
    #[error("fastener {id} is not registered")]
    Unregistered {
        /// The unknown id.
        id: FastenerId,
    },
    /// The owner key does not resolve to a store.
    #[error("the owner of the fastener no longer exists")]
    UnknownOwner,
}
