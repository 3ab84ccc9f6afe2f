// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-bit propagation and the externally driven update flush.
//!
//! [`Tree::require_update`] records work on a node. The request bubbles up,
//! setting each ancestor's top-level pass bit, until a mounted root hands it
//! to the tree's [`UpdateScheduler`](crate::UpdateScheduler) together with
//! the requested sub-phase bits. A later [`Tree::flush_updates`] runs both
//! passes on every pending root, seeding them with the merged bits, so a
//! sub-phase requested on a leaf runs on its ancestors on the way down.

use crate::config::ImmediatePolicy;
use crate::facet::HookResult;
use crate::refresh::UpdateReport;
use crate::tree::Tree;
use crate::types::{Flavor, NodeFlags, NodeId};

impl<F: Flavor> Tree<F> {
    /// Requires `bits` on `node`.
    ///
    /// Status bits are ignored. Only bits not already pending count; if there
    /// are none this does nothing. Otherwise the new bits are recorded,
    /// `on_require_update` hooks run, and the request is propagated with
    /// [`request_update`](Self::request_update).
    ///
    /// With [`TreeConfig::consumer_gated`](crate::TreeConfig::consumer_gated)
    /// a node that is not consuming only records the bits.
    pub fn require_update(&mut self, node: NodeId, bits: NodeFlags, immediate: bool) -> HookResult {
        let current = self.flags(node)?;
        let delta = bits.update_bits() - current;
        if delta.is_empty() {
            return Ok(());
        }
        self.insert_flags(node, delta)?;
        self.each_facet(node, move |facet, tree| facet.on_require_update(tree, node, delta, immediate))?;
        if self.config().consumer_gated() && !self.is_consuming(node) {
            tracing::trace!(%node, ?delta, "update held until consuming");
            return Ok(());
        }
        self.request_update(node, node, delta, immediate)
    }

    /// Propagates a request for `target` through `node`.
    ///
    /// The `needs_update` chain of `node` may rewrite `bits`. The node gains
    /// the top-level bit of each pass whose mask the bits hit; if that is new,
    /// or the request is immediate, `on_request_update` hooks run and the
    /// request continues to the parent, or to the scheduler at a mounted root.
    /// Otherwise the bits go straight to the scheduler of the mounted root,
    /// where they merge with the request already pending.
    pub fn request_update(
        &mut self,
        node: NodeId,
        target: NodeId,
        bits: NodeFlags,
        immediate: bool,
    ) -> HookResult {
        self.bubble(node, target, bits, immediate, false)
    }

    /// Re-requests bits recorded on `node` while nothing listened.
    pub(crate) fn propagate_pending(&mut self, node: NodeId) -> HookResult {
        let pending = self.flags(node)?.update_bits();
        if pending.is_empty() || (self.config().consumer_gated() && !self.is_consuming(node)) {
            return Ok(());
        }
        self.bubble(node, node, pending, false, true)
    }

    fn bubble(
        &mut self,
        node: NodeId,
        target: NodeId,
        bits: NodeFlags,
        immediate: bool,
        force: bool,
    ) -> HookResult {
        let current = self.flags(node)?;
        if current.contains(NodeFlags::REMOVING) {
            return Ok(());
        }
        let bits = self.needs_update_chain(node, bits.update_bits(), immediate)?.update_bits();
        let mut propagate = NodeFlags::empty();
        if bits.intersects(F::FIRST.mask) {
            propagate |= F::FIRST.needs;
        }
        if bits.intersects(F::SECOND.mask) {
            propagate |= F::SECOND.needs;
        }
        let delta = propagate - current;
        if delta.is_empty() && !immediate && !force {
            let root = self.root_of(node);
            if !bits.is_empty() && self.is_mounted(root) {
                self.scheduler.request_update(root, target, bits, false);
            }
            return Ok(());
        }
        let mut set = delta;
        if immediate {
            set |= NodeFlags::IMMEDIATE;
        }
        self.insert_flags(node, set)?;
        self.each_facet(node, move |facet, tree| {
            facet.on_request_update(tree, node, target, bits, immediate)
        })?;
        if delta.is_empty() && !force && self.config().immediate_policy() == ImmediatePolicy::LocalOnly {
            return Ok(());
        }

        match self.parent(node) {
            Some(parent) => self.bubble(parent, target, bits, immediate, force),
            None if current.contains(NodeFlags::MOUNTED) => self.hand_off(node, target, bits, immediate),
            None => Ok(()),
        }
    }

    fn hand_off(&mut self, root: NodeId, target: NodeId, bits: NodeFlags, immediate: bool) -> HookResult {
        self.scheduler.request_update(root, target, bits, immediate);
        if immediate && !self.updating && !self.is_traversing(root) {
            let report = self.flush_updates();
            if let Some((_, error)) = report.failed.into_iter().next() {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Runs the first then the second pass on every pending root.
    ///
    /// The sub-phase bits requested for a root cascade from it to all of its
    /// descendants. Roots that are stale, unmounted or have gained a parent
    /// are skipped.
    /// A failing root is logged, reported and scheduled again; the others
    /// still run. Requests made while flushing are kept for the next call.
    pub fn flush_updates(&mut self) -> UpdateReport {
        let mut report = UpdateReport::default();
        if self.updating {
            return report;
        }
        self.updating = true;
        for (root, bits) in self.scheduler.take_pending() {
            let eligible = self
                .node(root)
                .is_ok_and(|data| data.parent.is_none() && data.flags.contains(NodeFlags::MOUNTED));
            if !eligible {
                report.skipped += 1;
                continue;
            }
            match self.update_root(root, bits) {
                Ok(()) => report.updated.push(root),
                Err(error) => {
                    tracing::error!(%root, %error, "update pass failed");
                    let pending = self.flags(root).map(NodeFlags::update_bits).unwrap_or_default();
                    self.scheduler.request_update(root, root, bits | pending, false);
                    report.failed.push((root, error));
                }
            }
        }
        self.updating = false;
        tracing::trace!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            "flushed updates"
        );
        report
    }

    fn update_root(&mut self, root: NodeId, bits: NodeFlags) -> HookResult {
        let env = self.environment().clone();
        self.remove_flags(root, NodeFlags::IMMEDIATE)?;
        self.cascade_pass(root, F::FIRST, bits, &env)?;
        self.cascade_pass(root, F::SECOND, bits, &env)
    }
}
