// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree errors.

use alloc::string::String;

use understory_fastener::FastenerError;

use crate::types::NodeId;

/// Error returned by tree operations and cascades.
///
/// Protocol violations are reported before the tree is modified. Errors
/// raised by hooks propagate after the cascade has cleared its traversal
/// flags.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The id refers to a destroyed node.
    #[error("node {0} no longer exists")]
    StaleNode(NodeId),
    /// `cascade_mount` on a mounted node.
    #[error("node {0} is already mounted")]
    AlreadyMounted(NodeId),
    /// The operation requires a mounted node.
    #[error("node {0} is not mounted")]
    NotMounted(NodeId),
    /// `cascade_power` on a powered node.
    #[error("node {0} is already powered")]
    AlreadyPowered(NodeId),
    /// `cascade_unpower` on a node that is not powered.
    #[error("node {0} is not powered")]
    NotPowered(NodeId),
    /// A pass was started on a node already running it.
    #[error("node {0} is already running this pass")]
    Reentrant(NodeId),
    /// The child does not belong to the stated parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild {
        /// The stated parent.
        parent: NodeId,
        /// The node that is not its child.
        child: NodeId,
    },
    /// The insertion target does not belong to the stated parent.
    #[error("insertion target {target} is not a child of {parent}")]
    TargetNotChild {
        /// The stated parent.
        parent: NodeId,
        /// The misplaced target.
        target: NodeId,
    },
    /// Inserting the child would make it its own ancestor.
    #[error("inserting {child} under {parent} would create a cycle")]
    CyclicInsert {
        /// The prospective parent.
        parent: NodeId,
        /// The node being inserted.
        child: NodeId,
    },
    /// The child is attached to a parent whose children are being iterated.
    #[error("node {0} cannot be moved while its parent is traversing")]
    ParentTraversing(NodeId),
    /// The node must be detached and unmounted first.
    #[error("node {0} is still attached or mounted")]
    StillAttached(NodeId),
    /// A required facet is not attached.
    #[error("node {node} has no `{name}` facet")]
    MissingFacet {
        /// The node that was searched.
        node: NodeId,
        /// Type name of the missing facet.
        name: &'static str,
    },
    /// A fastener read or write failed.
    #[error(transparent)]
    Fastener(#[from] FastenerError),
    /// A hook reported a failure.
    #[error("hook on node {node} failed: {message}")]
    Hook {
        /// The node whose hook failed.
        node: NodeId,
        /// Description supplied by the hook.
        message: String,
    },
}

impl TreeError {
    /// Creates a [`TreeError::Hook`].
    pub fn hook(node: NodeId, message: impl Into<String>) -> Self {
        Self::Hook {
            node,
            message: message.into(),
        }
    }
}
