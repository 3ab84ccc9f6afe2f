// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle cascades and the generic two-phase pass.
//!
//! Every cascade marks the node [`TRAVERSING`](NodeFlags::TRAVERSING) while it
//! runs. Removals requested meanwhile are deferred and performed by the child
//! loop or, at the latest, when the traversal finishes.

use smallvec::SmallVec;
use understory_fastener::FastenerHostExt;

use crate::env::Environment;
use crate::error::TreeError;
use crate::facet::HookResult;
use crate::tree::Tree;
use crate::types::{Flavor, Lifecycle, Model, NodeFlags, NodeId, PassInfo, Phase, View};

impl<F: Flavor> Tree<F> {
    pub(crate) fn lifecycle_will(&mut self, node: NodeId, event: Lifecycle) -> HookResult {
        self.each_facet(node, move |facet, tree| facet.will_lifecycle(tree, node, event))?;
        self.each_observer(node, |o| o.will_lifecycle(node, event));
        Ok(())
    }

    pub(crate) fn lifecycle_on(&mut self, node: NodeId, event: Lifecycle) -> HookResult {
        self.each_facet(node, move |facet, tree| facet.on_lifecycle(tree, node, event))
    }

    pub(crate) fn lifecycle_did(&mut self, node: NodeId, event: Lifecycle) -> HookResult {
        self.each_facet(node, move |facet, tree| facet.did_lifecycle(tree, node, event))?;
        self.each_observer(node, |o| o.did_lifecycle(node, event));
        Ok(())
    }

    /// Mounts `node` and its subtree.
    ///
    /// Binds the node's fasteners to their supers and starts consuming if the
    /// node has consumers. Fails with [`TreeError::AlreadyMounted`] before
    /// touching any flag.
    pub fn cascade_mount(&mut self, node: NodeId) -> HookResult {
        let flags = self.flags(node)?;
        if flags.contains(NodeFlags::MOUNTED) {
            return Err(TreeError::AlreadyMounted(node));
        }
        tracing::trace!(%node, "mount");
        let nested = flags.contains(NodeFlags::TRAVERSING);
        self.insert_flags(node, NodeFlags::MOUNTED | NodeFlags::TRAVERSING)?;
        let result = self.mount_steps(node);
        let cleanup = self.finish_traversal(node, NodeFlags::empty(), nested);
        result.and(cleanup)?;
        if self.is_mounted(node) && self.parent(node).is_none() {
            self.propagate_pending(node)?;
        }
        Ok(())
    }

    fn mount_steps(&mut self, node: NodeId) -> HookResult {
        let event = Lifecycle::Mount;
        self.lifecycle_will(node, event)?;
        self.bind_fasteners(node)?;
        self.start_consuming(node)?;
        self.lifecycle_on(node, event)?;
        self.each_child(node, |tree, child| {
            if tree.is_mounted(child) {
                Ok(())
            } else {
                tree.cascade_mount(child)
            }
        })?;
        self.lifecycle_did(node, event)
    }

    /// Unmounts `node` and its subtree, unpowering it first if powered.
    pub fn cascade_unmount(&mut self, node: NodeId) -> HookResult {
        if !self.flags(node)?.contains(NodeFlags::MOUNTED) {
            return Err(TreeError::NotMounted(node));
        }
        if self.is_powered(node) {
            self.cascade_unpower(node)?;
        }
        tracing::trace!(%node, "unmount");
        let nested = self.is_traversing(node);
        self.insert_flags(node, NodeFlags::TRAVERSING)?;
        let result = self.unmount_steps(node);
        let cleanup = self.finish_traversal(node, NodeFlags::empty(), nested);
        result.and(cleanup)
    }

    fn unmount_steps(&mut self, node: NodeId) -> HookResult {
        let event = Lifecycle::Unmount;
        self.lifecycle_will(node, event)?;
        self.each_child(node, |tree, child| {
            if tree.is_mounted(child) {
                tree.cascade_unmount(child)
            } else {
                Ok(())
            }
        })?;
        self.stop_consuming(node)?;
        self.unmount_fasteners(node);
        self.remove_flags(node, NodeFlags::MOUNTED)?;
        self.lifecycle_on(node, event)?;
        self.lifecycle_did(node, event)
    }

    /// Powers `node` and its mounted subtree.
    pub fn cascade_power(&mut self, node: NodeId) -> HookResult {
        let flags = self.flags(node)?;
        if !flags.contains(NodeFlags::MOUNTED) {
            return Err(TreeError::NotMounted(node));
        }
        if flags.contains(NodeFlags::POWERED) {
            return Err(TreeError::AlreadyPowered(node));
        }
        tracing::trace!(%node, "power");
        let nested = flags.contains(NodeFlags::TRAVERSING);
        self.insert_flags(node, NodeFlags::POWERED | NodeFlags::TRAVERSING)?;
        let result = self.power_steps(node);
        let cleanup = self.finish_traversal(node, NodeFlags::empty(), nested);
        result.and(cleanup)
    }

    fn power_steps(&mut self, node: NodeId) -> HookResult {
        let event = Lifecycle::Power;
        self.lifecycle_will(node, event)?;
        self.lifecycle_on(node, event)?;
        self.each_child(node, |tree, child| {
            if tree.is_mounted(child) && !tree.is_powered(child) {
                tree.cascade_power(child)
            } else {
                Ok(())
            }
        })?;
        self.lifecycle_did(node, event)
    }

    /// Unpowers `node` and its subtree.
    pub fn cascade_unpower(&mut self, node: NodeId) -> HookResult {
        let flags = self.flags(node)?;
        if !flags.contains(NodeFlags::POWERED) {
            return Err(TreeError::NotPowered(node));
        }
        tracing::trace!(%node, "unpower");
        let nested = flags.contains(NodeFlags::TRAVERSING);
        self.insert_flags(node, NodeFlags::TRAVERSING)?;
        let result = self.unpower_steps(node);
        let cleanup = self.finish_traversal(node, NodeFlags::empty(), nested);
        result.and(cleanup)
    }

    fn unpower_steps(&mut self, node: NodeId) -> HookResult {
        let event = Lifecycle::Unpower;
        self.lifecycle_will(node, event)?;
        self.each_child(node, |tree, child| {
            if tree.is_powered(child) {
                tree.cascade_unpower(child)
            } else {
                Ok(())
            }
        })?;
        self.remove_flags(node, NodeFlags::POWERED)?;
        self.lifecycle_on(node, event)?;
        self.lifecycle_did(node, event)
    }

    /// Visits each child of `node` in order.
    ///
    /// A child flagged [`REMOVING`](NodeFlags::REMOVING) is skipped. After each
    /// visit the child is re-located, so insertions made by the visit do not
    /// shift the walk, and it is detached if the visit flagged it.
    pub(crate) fn each_child(
        &mut self,
        node: NodeId,
        mut visit: impl FnMut(&mut Self, NodeId) -> HookResult,
    ) -> HookResult {
        let mut idx = 0;
        while let Some(&child) = self.node(node)?.children.get(idx) {
            let result = if self.is_removing(child) {
                Ok(())
            } else {
                visit(self, child)
            };
            if let Some(pos) = self.node(node)?.children.iter().position(|&c| c == child) {
                if self.is_removing(child) {
                    self.detach_child(node, child)?;
                    idx = pos;
                } else {
                    idx = pos + 1;
                }
            }
            result?;
        }
        Ok(())
    }

    /// Ends a traversal of `node`.
    ///
    /// Clears `active` and, unless nested in another traversal of the same
    /// node, [`TRAVERSING`](NodeFlags::TRAVERSING). Then sweeps children still
    /// flagged for removal and detaches `node` itself if it was flagged and
    /// its parent is idle.
    fn finish_traversal(&mut self, node: NodeId, active: NodeFlags, nested: bool) -> HookResult {
        if !self.is_alive(node) {
            return Ok(());
        }
        if nested {
            return self.remove_flags(node, active);
        }
        self.remove_flags(node, active | NodeFlags::TRAVERSING)?;

        let flagged: SmallVec<[NodeId; 4]> = self
            .children(node)
            .iter()
            .copied()
            .filter(|&child| self.is_removing(child))
            .collect();
        for child in flagged {
            if self.parent(child) == Some(node) && self.is_removing(child) {
                self.detach_child(node, child)?;
            }
        }

        if self.is_removing(node)
            && let Some(parent) = self.parent(node)
            && !self.is_traversing(parent)
        {
            self.detach_child(parent, node)?;
        }
        Ok(())
    }

    /// Runs one pass on `node` and, as needed, its subtree.
    ///
    /// `incoming` carries the sub-phase bits cascaded from the parent.
    pub(crate) fn cascade_pass(
        &mut self,
        node: NodeId,
        info: PassInfo,
        incoming: NodeFlags,
        env: &Environment,
    ) -> HookResult {
        let current = self.flags(node)?;
        if !current.contains(NodeFlags::MOUNTED) {
            return Err(TreeError::NotMounted(node));
        }
        if current.intersects(info.active) {
            return Err(TreeError::Reentrant(node));
        }
        let env = self.extend_environment(node, env)?;
        let flags = ((incoming & info.mask) - info.needs) | (current & info.mask);
        let flags = self.needs_pass_chain(node, info.pass, flags, &env)?;
        if !flags.intersects(info.mask) {
            return Ok(());
        }

        tracing::trace!(%node, pass = ?info.pass, ?flags, "pass");
        let nested = current.contains(NodeFlags::TRAVERSING);
        {
            let data = self.node_mut(node)?;
            data.flags |= NodeFlags::TRAVERSING | info.active;
            data.flags -= info.needs | NodeFlags::IMMEDIATE;
        }
        let result = self.run_pass(node, info, flags, &env);
        if result.is_err() {
            // Leave the work pending for the next flush.
            self.insert_flags(node, info.needs | (flags & info.mask))?;
        }
        let cleanup = self.finish_traversal(node, info.active, nested);
        result.and(cleanup)
    }

    fn run_pass(&mut self, node: NodeId, info: PassInfo, flags: NodeFlags, env: &Environment) -> HookResult {
        let pass = info.pass;
        let owned = env.clone();
        self.each_facet(node, move |facet, tree| facet.will_pass(tree, node, pass, flags, &owned))?;

        let mut cascade = NodeFlags::empty();
        let mut included: SmallVec<[Phase; 5]> = SmallVec::new();
        for &phase in info.phases {
            let bit = phase.flag();
            if !(self.flags(node)? | flags).contains(bit) {
                continue;
            }
            cascade |= bit;
            included.push(phase);
            self.remove_flags(node, bit)?;
            let owned = env.clone();
            self.each_facet(node, move |facet, tree| facet.will_phase(tree, node, phase, &owned))?;
            self.each_observer(node, |o| o.will_phase(node, phase));
        }

        let owned = env.clone();
        self.each_facet(node, move |facet, tree| facet.on_pass(tree, node, pass, flags, &owned))?;
        for &phase in &included {
            let owned = env.clone();
            self.each_facet(node, move |facet, tree| facet.on_phase(tree, node, phase, &owned))?;
        }

        let hooks = self.hooks(node)?;
        self.traverse_chain(node, info, cascade, env, &hooks)?;

        for &phase in included.iter().rev() {
            let owned = env.clone();
            self.each_facet(node, move |facet, tree| facet.did_phase(tree, node, phase, &owned))?;
            self.each_observer(node, |o| o.did_phase(node, phase));
        }
        let owned = env.clone();
        self.each_facet(node, move |facet, tree| facet.did_pass(tree, node, pass, flags, &owned))
    }

    /// The default child walk of a pass.
    pub(crate) fn walk_children(
        &mut self,
        node: NodeId,
        info: PassInfo,
        flags: NodeFlags,
        env: &Environment,
    ) -> HookResult {
        self.each_child(node, |tree, child| {
            if tree.is_mounted(child) {
                tree.cascade_pass(child, info, flags, env)
            } else {
                Ok(())
            }
        })
    }
}

impl Tree<Model> {
    /// Runs the analyze pass (mutate, aggregate, correlate) from `node`.
    ///
    /// `flags` adds sub-phase bits to run on the whole subtree.
    pub fn cascade_analyze(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        let env = self.environment().clone();
        self.cascade_pass(node, Model::FIRST, flags, &env)
    }

    /// Runs the refresh pass (validate, reconcile) from `node`.
    pub fn cascade_refresh(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        let env = self.environment().clone();
        self.cascade_pass(node, Model::SECOND, flags, &env)
    }
}

impl Tree<View> {
    /// Runs the process pass (resize, scroll, change, animate, project) from `node`.
    pub fn cascade_process(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        let env = self.environment().clone();
        self.cascade_pass(node, View::FIRST, flags, &env)
    }

    /// Runs the display pass (layout, render, rasterize, composite) from `node`.
    pub fn cascade_display(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        let env = self.environment().clone();
        self.cascade_pass(node, View::SECOND, flags, &env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::Facet;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    type Log = Rc<RefCell<Vec<(NodeId, Lifecycle, &'static str)>>>;

    struct Recorder(Log);

    impl Facet<Model> for Recorder {
        fn will_lifecycle(&mut self, _: &mut Tree<Model>, node: NodeId, event: Lifecycle) -> HookResult {
            self.0.borrow_mut().push((node, event, "will"));
            Ok(())
        }

        fn did_lifecycle(&mut self, _: &mut Tree<Model>, node: NodeId, event: Lifecycle) -> HookResult {
            self.0.borrow_mut().push((node, event, "did"));
            Ok(())
        }
    }

    fn chain(tree: &mut Tree<Model>, log: &Log) -> (NodeId, NodeId) {
        let root = tree.create_node();
        let child = tree.create_node();
        tree.append_child(root, child, None).unwrap();
        tree.attach_facet(root, Recorder(log.clone())).unwrap();
        tree.attach_facet(child, Recorder(log.clone())).unwrap();
        (root, child)
    }

    #[test]
    fn mount_nests_children_inside_parent() {
        let mut tree = Tree::new();
        let log = Log::default();
        let (root, child) = chain(&mut tree, &log);
        tree.cascade_mount(root).unwrap();
        assert_eq!(
            *log.borrow(),
            [
                (root, Lifecycle::Mount, "will"),
                (child, Lifecycle::Mount, "will"),
                (child, Lifecycle::Mount, "did"),
                (root, Lifecycle::Mount, "did"),
            ]
        );
        assert!(!tree.is_traversing(root));
    }

    #[test]
    fn second_mount_fails_untouched() {
        let mut tree = Tree::new();
        let log = Log::default();
        let (root, _) = chain(&mut tree, &log);
        tree.cascade_mount(root).unwrap();
        let before = tree.flags(root).unwrap();
        assert_eq!(tree.cascade_mount(root), Err(TreeError::AlreadyMounted(root)));
        assert_eq!(tree.flags(root).unwrap(), before);
    }

    #[test]
    fn unmount_unpowers_first() {
        let mut tree = Tree::new();
        let log = Log::default();
        let (root, child) = chain(&mut tree, &log);
        tree.cascade_mount(root).unwrap();
        tree.cascade_power(root).unwrap();
        assert!(tree.is_powered(child));
        log.borrow_mut().clear();

        tree.cascade_unmount(root).unwrap();
        assert_eq!(
            *log.borrow(),
            [
                (root, Lifecycle::Unpower, "will"),
                (child, Lifecycle::Unpower, "will"),
                (child, Lifecycle::Unpower, "did"),
                (root, Lifecycle::Unpower, "did"),
                (root, Lifecycle::Unmount, "will"),
                (child, Lifecycle::Unmount, "will"),
                (child, Lifecycle::Unmount, "did"),
                (root, Lifecycle::Unmount, "did"),
            ]
        );
        assert!(!tree.is_mounted(child));
        assert!(!tree.is_powered(root));
    }

    #[test]
    fn power_preconditions() {
        let mut tree = Tree::<Model>::new();
        let node = tree.create_node();
        assert_eq!(tree.cascade_power(node), Err(TreeError::NotMounted(node)));
        assert_eq!(tree.cascade_unmount(node), Err(TreeError::NotMounted(node)));
        tree.cascade_mount(node).unwrap();
        assert_eq!(tree.cascade_unpower(node), Err(TreeError::NotPowered(node)));
        tree.cascade_power(node).unwrap();
        assert_eq!(tree.cascade_power(node), Err(TreeError::AlreadyPowered(node)));
    }

    #[test]
    fn explicit_pass_runs_requested_phases() {
        #[derive(Default)]
        struct Phases(Vec<Phase>);

        impl Facet<Model> for Phases {
            fn on_phase(&mut self, _: &mut Tree<Model>, _: NodeId, phase: Phase, _: &Environment) -> HookResult {
                self.0.push(phase);
                Ok(())
            }
        }

        let mut tree = Tree::<Model>::new();
        let root = tree.create_node();
        let child = tree.create_node();
        tree.append_child(root, child, None).unwrap();
        let phases = tree.attach_facet(child, Phases::default()).unwrap();
        tree.cascade_mount(root).unwrap();

        tree.cascade_analyze(root, NodeFlags::NEEDS_AGGREGATE | NodeFlags::NEEDS_MUTATE)
            .unwrap();
        assert_eq!(phases.borrow().0, [Phase::Mutate, Phase::Aggregate]);
        // Refresh bits do not run during analyze.
        tree.cascade_analyze(root, NodeFlags::NEEDS_VALIDATE).unwrap();
        assert_eq!(phases.borrow().0.len(), 2);
        tree.cascade_refresh(root, NodeFlags::NEEDS_VALIDATE).unwrap();
        assert_eq!(phases.borrow().0.last(), Some(&Phase::Validate));
    }
}
