// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hand-off of update requests from tree roots to a scheduler.

use alloc::vec::Vec;

use crate::error::TreeError;
use crate::types::{NodeFlags, NodeId};

/// Counters kept by a scheduler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Requests received.
    pub requests: u64,
    /// Requests for a root that was already pending; their bits were merged.
    pub coalesced: u64,
}

/// Receives update requests that reached a mounted root.
///
/// The scheduler decides when to call [`Tree::flush_updates`](crate::Tree::flush_updates);
/// it only has to remember which roots asked and the union of the bits they
/// asked for. Those bits seed the sub-phases of the root's passes.
pub trait UpdateScheduler: core::fmt::Debug {
    /// Records that `root` needs a pass on behalf of `target`.
    fn request_update(&mut self, root: NodeId, target: NodeId, bits: NodeFlags, immediate: bool);

    /// Returns the pending roots in request order, each with its merged bits,
    /// and forgets them.
    fn take_pending(&mut self) -> Vec<(NodeId, NodeFlags)>;

    /// Returns `true` if `root` is waiting for a pass.
    fn is_pending(&self, root: NodeId) -> bool;

    /// Returns the counters.
    fn stats(&self) -> SchedulerStats {
        SchedulerStats::default()
    }
}

/// Default scheduler: one pending entry per root.
#[derive(Clone, Debug, Default)]
pub struct RefreshManager {
    pending: Vec<(NodeId, NodeFlags)>,
    stats: SchedulerStats,
}

impl RefreshManager {
    /// Creates an idle manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending roots.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no root is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl UpdateScheduler for RefreshManager {
    fn request_update(&mut self, root: NodeId, target: NodeId, bits: NodeFlags, immediate: bool) {
        self.stats.requests += 1;
        let bits = bits.update_bits();
        if let Some((_, merged)) = self.pending.iter_mut().find(|(r, _)| *r == root) {
            *merged |= bits;
            self.stats.coalesced += 1;
            tracing::trace!(%root, %target, ?bits, immediate, "coalesced update request");
            return;
        }
        tracing::trace!(%root, %target, ?bits, immediate, "scheduled update");
        self.pending.push((root, bits));
    }

    fn take_pending(&mut self) -> Vec<(NodeId, NodeFlags)> {
        core::mem::take(&mut self.pending)
    }

    fn is_pending(&self, root: NodeId) -> bool {
        self.pending.iter().any(|(r, _)| *r == root)
    }

    fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

/// Outcome of [`Tree::flush_updates`](crate::Tree::flush_updates).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Roots whose passes completed.
    pub updated: Vec<NodeId>,
    /// Roots whose passes failed; they stay scheduled.
    pub failed: Vec<(NodeId, TreeError)>,
    /// Pending roots that were stale, unmounted or no longer roots.
    pub skipped: usize,
}

impl UpdateReport {
    /// Returns `true` if every pass completed.
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_per_root() {
        let mut manager = RefreshManager::new();
        let a = NodeId::new(0, 1);
        let b = NodeId::new(1, 1);
        manager.request_update(a, a, NodeFlags::NEEDS_MUTATE, false);
        manager.request_update(b, b, NodeFlags::NEEDS_AGGREGATE, false);
        manager.request_update(a, b, NodeFlags::NEEDS_VALIDATE | NodeFlags::MOUNTED, true);

        assert!(manager.is_pending(a));
        assert_eq!(
            manager.stats(),
            SchedulerStats {
                requests: 3,
                coalesced: 1
            }
        );
        assert_eq!(
            manager.take_pending(),
            [
                (a, NodeFlags::NEEDS_MUTATE | NodeFlags::NEEDS_VALIDATE),
                (b, NodeFlags::NEEDS_AGGREGATE),
            ]
        );
        assert!(manager.is_empty());
    }
}
