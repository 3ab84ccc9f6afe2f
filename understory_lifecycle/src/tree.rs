// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The node arena and structural operations.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use understory_fastener::{ErasedValue, FastenerClass, FastenerId, FastenerRegistry, FastenerStore};

use crate::config::TreeConfig;
use crate::env::Environment;
use crate::error::TreeError;
use crate::facet::{DeferredHook, FacetEntry, HookResult};
use crate::observer::{Consumer, ObserverRef};
use crate::refresh::{RefreshManager, UpdateScheduler};
use crate::types::{Flavor, NodeFlags, NodeId};

pub(crate) struct NodeData<F: Flavor> {
    pub(crate) flags: NodeFlags,
    pub(crate) key: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) children_by_key: HashMap<String, NodeId>,
    pub(crate) facets: Vec<FacetEntry<F>>,
    pub(crate) behavior: Option<FacetEntry<F>>,
    pub(crate) observers: Vec<ObserverRef>,
    pub(crate) consumers: Vec<Rc<dyn Consumer>>,
    pub(crate) fasteners: FastenerStore<NodeId>,
    pub(crate) class: Rc<FastenerClass>,
}

impl<F: Flavor> NodeData<F> {
    fn new(id: NodeId, class: Rc<FastenerClass>) -> Self {
        Self {
            flags: NodeFlags::empty(),
            key: None,
            parent: None,
            children: Vec::new(),
            children_by_key: HashMap::new(),
            facets: Vec::new(),
            behavior: None,
            observers: Vec::new(),
            consumers: Vec::new(),
            fasteners: FastenerStore::new(id),
            class,
        }
    }
}

struct Slot<F: Flavor> {
    generation: u32,
    data: Option<NodeData<F>>,
}

/// Where an insertion lands among the parent's children.
#[derive(Copy, Clone, Debug)]
enum Anchor {
    Start,
    End,
    Before(NodeId),
    /// In place of the child currently holding the insertion key.
    KeyOccupant,
}

/// A retained tree of nodes of one flavor.
///
/// The tree owns every node in a generational arena and the registry of the
/// fasteners its nodes declare. Structure is changed with the insertion and
/// removal operations below; lifecycle and dirty cascades are driven with
/// the `cascade_*` methods and [`flush_updates`](Self::flush_updates).
///
/// ```rust
/// use understory_lifecycle::{Model, Tree};
///
/// let mut tree = Tree::<Model>::new();
/// let root = tree.create_node();
/// let a = tree.create_node();
/// let b = tree.create_node();
///
/// tree.append_child(root, a, Some("a")).unwrap();
/// tree.append_child(root, b, None).unwrap();
/// tree.cascade_mount(root).unwrap();
///
/// assert_eq!(tree.children(root), &[a, b]);
/// assert_eq!(tree.child(root, "a"), Some(a));
/// assert!(tree.is_mounted(b));
///
/// tree.remove(a).unwrap();
/// assert_eq!(tree.children(root), &[b]);
/// assert!(!tree.is_mounted(a));
/// ```
pub struct Tree<F: Flavor> {
    slots: Vec<Slot<F>>,
    free_list: Vec<u32>,
    live: usize,
    pub(crate) registry: FastenerRegistry,
    pub(crate) ambient: HashMap<FastenerId, ErasedValue>,
    config: TreeConfig,
    pub(crate) scheduler: Box<dyn UpdateScheduler>,
    pub(crate) updating: bool,
    pub(crate) deferred: Vec<DeferredHook<F>>,
    environment: Environment,
    default_class: Rc<FastenerClass>,
}

impl<F: Flavor> fmt::Debug for Tree<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("flavor", &F::NAME)
            .field("live", &self.live)
            .field("free", &self.free_list.len())
            .field("config", &self.config)
            .field("updating", &self.updating)
            .field("deferred", &self.deferred.len())
            .finish_non_exhaustive()
    }
}

impl<F: Flavor> Default for Tree<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Flavor> Tree<F> {
    /// Creates an empty tree with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Creates an empty tree.
    #[must_use]
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            registry: FastenerRegistry::new(),
            ambient: HashMap::new(),
            config,
            scheduler: Box::new(RefreshManager::new()),
            updating: false,
            deferred: Vec::new(),
            environment: Environment::new(),
            default_class: Rc::new(FastenerClass::empty(F::NAME)),
        }
    }

    /// Replaces the fastener registry. Call before creating classes.
    #[must_use]
    pub fn with_registry(mut self, registry: FastenerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the update scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Box<dyn UpdateScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Returns the fastener registry.
    pub fn registry(&self) -> &FastenerRegistry {
        &self.registry
    }

    /// Returns the fastener registry mutably, to register fasteners.
    pub fn registry_mut(&mut self) -> &mut FastenerRegistry {
        &mut self.registry
    }

    /// Returns the update scheduler.
    pub fn scheduler(&self) -> &dyn UpdateScheduler {
        &*self.scheduler
    }

    /// Returns the environment passes start from.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Sets the environment passes start from.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the tree has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // --- arena ---

    /// Creates a detached node with no fasteners.
    pub fn create_node(&mut self) -> NodeId {
        let class = self.default_class.clone();
        self.create_node_with(class)
    }

    /// Creates a detached node declaring the fields of `class`.
    pub fn create_node_with(&mut self, class: Rc<FastenerClass>) -> NodeId {
        let id = if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            NodeId::new(idx, slot.generation)
        } else {
            #[expect(clippy::cast_possible_truncation, reason = "arena stays below u32::MAX")]
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                data: None,
            });
            NodeId::new(idx, 1)
        };
        self.slots[id.idx()].data = Some(NodeData::new(id, class));
        self.live += 1;
        id
    }

    /// Frees a detached, unmounted node and its subtree.
    ///
    /// Facets receive `detached`, children before their parent. Nothing is
    /// freed unless every hook succeeds. Ids of destroyed nodes become stale.
    pub fn destroy(&mut self, node: NodeId) -> HookResult {
        let data = self.node(node)?;
        if data.parent.is_some() || data.flags.contains(NodeFlags::MOUNTED) {
            return Err(TreeError::StillAttached(node));
        }
        let mut doomed = Vec::new();
        self.collect_postorder(node, &mut doomed)?;
        for &n in &doomed {
            self.each_facet(n, move |facet, tree| facet.detached(tree, n))?;
        }
        for n in doomed {
            if self.node(n).is_err() {
                continue;
            }
            self.slots[n.idx()].data = None;
            self.free_list.push(n.0);
            self.live -= 1;
            tracing::trace!(node = %n, "destroyed");
        }
        Ok(())
    }

    fn collect_postorder(&self, node: NodeId, out: &mut Vec<NodeId>) -> HookResult {
        for &child in &self.node(node)?.children {
            self.collect_postorder(child, out)?;
        }
        out.push(node);
        Ok(())
    }

    /// Returns `true` if `node` refers to a live node.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.node(node).is_ok()
    }

    pub(crate) fn node(&self, node: NodeId) -> Result<&NodeData<F>, TreeError> {
        self.slots
            .get(node.idx())
            .filter(|slot| slot.generation == node.1)
            .and_then(|slot| slot.data.as_ref())
            .ok_or(TreeError::StaleNode(node))
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Result<&mut NodeData<F>, TreeError> {
        self.slots
            .get_mut(node.idx())
            .filter(|slot| slot.generation == node.1)
            .and_then(|slot| slot.data.as_mut())
            .ok_or(TreeError::StaleNode(node))
    }

    pub(crate) fn insert_flags(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        self.node_mut(node)?.flags |= flags;
        Ok(())
    }

    pub(crate) fn remove_flags(&mut self, node: NodeId, flags: NodeFlags) -> HookResult {
        self.node_mut(node)?.flags -= flags;
        Ok(())
    }

    // --- accessors ---

    /// Returns the flags of `node`.
    pub fn flags(&self, node: NodeId) -> Result<NodeFlags, TreeError> {
        Ok(self.node(node)?.flags)
    }

    fn has_flag(&self, node: NodeId, flag: NodeFlags) -> bool {
        self.node(node).is_ok_and(|data| data.flags.contains(flag))
    }

    /// Returns `true` if `node` is mounted.
    pub fn is_mounted(&self, node: NodeId) -> bool {
        self.has_flag(node, NodeFlags::MOUNTED)
    }

    /// Returns `true` if `node` is powered.
    pub fn is_powered(&self, node: NodeId) -> bool {
        self.has_flag(node, NodeFlags::POWERED)
    }

    /// Returns `true` if `node` is consuming.
    pub fn is_consuming(&self, node: NodeId) -> bool {
        self.has_flag(node, NodeFlags::CONSUMING)
    }

    /// Returns `true` while a cascade iterates the children of `node`.
    pub fn is_traversing(&self, node: NodeId) -> bool {
        self.has_flag(node, NodeFlags::TRAVERSING)
    }

    /// Returns `true` if removal of `node` is deferred.
    pub fn is_removing(&self, node: NodeId) -> bool {
        self.has_flag(node, NodeFlags::REMOVING)
    }

    /// Returns the parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok()?.parent
    }

    /// Returns the children of `node` in order; empty for stale ids.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |data| &data.children)
    }

    /// Returns the child of `parent` holding `key`.
    pub fn child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.node(parent).ok()?.children_by_key.get(key).copied()
    }

    /// Returns the key of `node` among its siblings.
    pub fn key(&self, node: NodeId) -> Option<&str> {
        self.node(node).ok()?.key.as_deref()
    }

    /// Returns the fastener class `node` was created with.
    pub fn class(&self, node: NodeId) -> Option<&Rc<FastenerClass>> {
        self.node(node).ok().map(|data| &data.class)
    }

    /// Returns the topmost ancestor of `node`, or `node` itself.
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Returns the sibling after `node`.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let children = self.children(parent);
        let idx = children.iter().position(|&c| c == node)?;
        children.get(idx + 1).copied()
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    // --- insertion ---

    /// Appends `child` to `parent`, optionally under `key`.
    ///
    /// Any child already holding `key` is removed first. Returns it.
    pub fn append_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        key: Option<&str>,
    ) -> Result<Option<NodeId>, TreeError> {
        self.insert_at(parent, child, Anchor::End, key)
    }

    /// Prepends `child` to `parent`, optionally under `key`.
    pub fn prepend_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        key: Option<&str>,
    ) -> Result<Option<NodeId>, TreeError> {
        self.insert_at(parent, child, Anchor::Start, key)
    }

    /// Inserts `child` before `target`, or appends when `target` is `None`.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        target: Option<NodeId>,
        key: Option<&str>,
    ) -> Result<Option<NodeId>, TreeError> {
        let anchor = target.map_or(Anchor::End, Anchor::Before);
        self.insert_at(parent, child, anchor, key)
    }

    /// Sets the child of `parent` held under `key`.
    ///
    /// A new child takes the position of the previous holder, which is
    /// removed and returned. `None` only removes the holder.
    pub fn set_child(
        &mut self,
        parent: NodeId,
        key: &str,
        child: Option<NodeId>,
    ) -> Result<Option<NodeId>, TreeError> {
        let old = self.child(parent, key);
        match child {
            Some(child) if Some(child) == old => Ok(None),
            Some(child) => self.insert_at(parent, child, Anchor::KeyOccupant, Some(key)),
            None => {
                if let Some(old) = old {
                    self.remove(old)?;
                    self.release_key(parent, old)?;
                }
                Ok(old)
            }
        }
    }

    /// Replaces `old` with `new`, which takes its position and key.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<NodeId, TreeError> {
        if self.node(old)?.parent != Some(parent) {
            return Err(TreeError::NotAChild { parent, child: old });
        }
        self.validate_insert(parent, new, None)?;
        let key = self.node(old)?.key.clone();
        let anchor = self.next_sibling(old).map_or(Anchor::End, Anchor::Before);
        self.remove(old)?;
        self.release_key(parent, old)?;
        self.insert_at(parent, new, anchor, key.as_deref())?;
        Ok(old)
    }

    /// Checks an insertion without modifying anything.
    fn validate_insert(&self, parent: NodeId, child: NodeId, target: Option<NodeId>) -> HookResult {
        self.node(parent)?;
        let data = self.node(child)?;
        if let Some(target) = target
            && target != child
            && self.node(target)?.parent != Some(parent)
        {
            return Err(TreeError::TargetNotChild { parent, target });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::CyclicInsert { parent, child });
        }
        if let Some(old_parent) = data.parent
            && (data.flags.contains(NodeFlags::TRAVERSING) || self.is_traversing(old_parent))
        {
            return Err(TreeError::ParentTraversing(child));
        }
        Ok(())
    }

    /// Drops a deferred-removal node's key so a new child can take it.
    fn release_key(&mut self, parent: NodeId, old: NodeId) -> HookResult {
        if self.node(old)?.parent != Some(parent) {
            return Ok(());
        }
        let key = self.node_mut(old)?.key.take();
        if let Some(key) = key {
            let data = self.node_mut(parent)?;
            if data.children_by_key.get(&key) == Some(&old) {
                data.children_by_key.remove(&key);
            }
        }
        Ok(())
    }

    fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        anchor: Anchor,
        key: Option<&str>,
    ) -> Result<Option<NodeId>, TreeError> {
        let target = match anchor {
            Anchor::Before(target) => Some(target),
            _ => None,
        };
        self.validate_insert(parent, child, target)?;

        // Moving within or across parents: detach first.
        let mut anchor = anchor;
        if let Anchor::Before(target) = anchor
            && target == child
        {
            anchor = self.next_sibling(child).map_or(Anchor::End, Anchor::Before);
        }
        if self.node(child)?.parent.is_some() {
            self.remove(child)?;
        }

        let old = match key {
            Some(key) => self.child(parent, key),
            None => None,
        };
        if let Some(old) = old {
            let next = self.next_sibling(old);
            match anchor {
                Anchor::KeyOccupant => anchor = next.map_or(Anchor::End, Anchor::Before),
                Anchor::Before(target) if target == old => {
                    anchor = next.map_or(Anchor::End, Anchor::Before);
                }
                _ => {}
            }
            self.remove(old)?;
            // Still present when deferred; the key moves to the new child now.
            self.release_key(parent, old)?;
        } else if matches!(anchor, Anchor::KeyOccupant) {
            anchor = Anchor::End;
        }

        let target = match anchor {
            Anchor::Before(target) => Some(target),
            _ => None,
        };
        self.each_facet(parent, move |facet, tree| {
            facet.will_insert_child(tree, parent, child, target)
        })?;
        self.each_observer(parent, |o| o.will_insert_child(parent, child, target));
        self.each_observer(child, |o| o.will_set_parent(child, Some(parent), None));

        let data = self.node_mut(parent)?;
        let idx = match anchor {
            Anchor::Start => 0,
            Anchor::Before(target) => data
                .children
                .iter()
                .position(|&c| c == target)
                .unwrap_or(data.children.len()),
            Anchor::End | Anchor::KeyOccupant => data.children.len(),
        };
        data.children.insert(idx, child);
        if let Some(key) = key {
            data.children_by_key.insert(key.into(), child);
        }
        let parent_flags = data.flags;
        let child_data = self.node_mut(child)?;
        child_data.parent = Some(parent);
        child_data.key = key.map(String::from);
        tracing::trace!(%parent, %child, idx, ?key, "inserted child");

        self.each_observer(child, |o| o.did_set_parent(child, Some(parent), None));
        self.each_facet(parent, move |facet, tree| facet.on_insert_child(tree, parent, child))?;
        self.each_facet(parent, move |facet, tree| facet.did_insert_child(tree, parent, child))?;
        self.each_observer(parent, |o| o.did_insert_child(parent, child));

        if parent_flags.contains(NodeFlags::MOUNTED) && !self.is_mounted(child) {
            self.cascade_mount(child)?;
        }
        if parent_flags.contains(NodeFlags::POWERED)
            && self.is_mounted(child)
            && !self.is_powered(child)
        {
            self.cascade_power(child)?;
        }
        let pending = self.flags(child)?.update_bits();
        if !pending.is_empty() && self.parent(child) == Some(parent) {
            self.request_update(parent, child, pending, false)?;
        }
        Ok(old)
    }

    // --- removal ---

    /// Detaches `node` from its parent.
    ///
    /// While the parent or the node itself is traversing, the node is only
    /// flagged [`REMOVING`](NodeFlags::REMOVING); the active cascade detaches
    /// it before it returns. A node without a parent is left alone.
    pub fn remove(&mut self, node: NodeId) -> HookResult {
        let data = self.node(node)?;
        let Some(parent) = data.parent else {
            return Ok(());
        };
        if data.flags.contains(NodeFlags::TRAVERSING) || self.is_traversing(parent) {
            if !data.flags.contains(NodeFlags::REMOVING) {
                tracing::debug!(%node, %parent, "deferred removal");
                self.insert_flags(node, NodeFlags::REMOVING)?;
            }
            return Ok(());
        }
        self.detach_child(parent, node)
    }

    /// Removes `child` from `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> HookResult {
        if self.node(child)?.parent != Some(parent) {
            return Err(TreeError::NotAChild { parent, child });
        }
        self.remove(child)
    }

    /// Removes every child of `parent`, last first.
    pub fn remove_children(&mut self, parent: NodeId) -> HookResult {
        let children = self.node(parent)?.children.clone();
        for child in children.into_iter().rev() {
            if self.parent(child) == Some(parent) {
                self.remove(child)?;
            }
        }
        Ok(())
    }

    /// Detaches `child` now, regardless of traversal state.
    pub(crate) fn detach_child(&mut self, parent: NodeId, child: NodeId) -> HookResult {
        // Taken over from here; the child's own cascades must not detach it again.
        self.remove_flags(child, NodeFlags::REMOVING)?;
        self.each_facet(parent, move |facet, tree| facet.will_remove_child(tree, parent, child))?;
        self.each_observer(parent, |o| o.will_remove_child(parent, child));
        self.each_observer(child, |o| o.will_set_parent(child, None, Some(parent)));

        if self.is_powered(child) {
            self.cascade_unpower(child)?;
        }
        if self.is_mounted(child) {
            self.cascade_unmount(child)?;
        }
        if self.node(child)?.parent != Some(parent) {
            // A hook already moved it.
            return Ok(());
        }

        let key = {
            let data = self.node_mut(child)?;
            data.parent = None;
            data.key.take()
        };
        let data = self.node_mut(parent)?;
        data.children.retain(|&c| c != child);
        if let Some(key) = key
            && data.children_by_key.get(&key) == Some(&child)
        {
            data.children_by_key.remove(&key);
        }
        tracing::trace!(%parent, %child, "removed child");

        self.each_observer(child, |o| o.did_set_parent(child, None, Some(parent)));
        self.each_facet(parent, move |facet, tree| facet.on_remove_child(tree, parent, child))?;
        self.each_facet(parent, move |facet, tree| facet.did_remove_child(tree, parent, child))?;
        self.each_observer(parent, |o| o.did_remove_child(parent, child));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Model;

    fn tree_with_root() -> (Tree<Model>, NodeId) {
        let mut tree = Tree::new();
        let root = tree.create_node();
        (tree, root)
    }

    #[test]
    fn ids_are_generational() {
        let (mut tree, root) = tree_with_root();
        tree.destroy(root).unwrap();
        assert!(!tree.is_alive(root));
        let reused = tree.create_node();
        assert_eq!(reused.idx(), root.idx());
        assert_ne!(reused, root);
        assert_eq!(tree.flags(root), Err(TreeError::StaleNode(root)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn insert_positions() {
        let (mut tree, root) = tree_with_root();
        let [a, b, c, d] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, None).unwrap();
        tree.prepend_child(root, b, None).unwrap();
        tree.insert_child(root, c, Some(a), None).unwrap();
        tree.insert_child(root, d, None, None).unwrap();
        assert_eq!(tree.children(root), &[b, c, a, d]);
        assert_eq!(tree.next_sibling(c), Some(a));
        assert_eq!(tree.root_of(d), root);
    }

    #[test]
    fn set_child_takes_position() {
        let (mut tree, root) = tree_with_root();
        let [a, b, c, d] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, None).unwrap();
        tree.append_child(root, b, Some("slot")).unwrap();
        tree.append_child(root, c, None).unwrap();

        let old = tree.set_child(root, "slot", Some(d)).unwrap();
        assert_eq!(old, Some(b));
        assert_eq!(tree.children(root), &[a, d, c]);
        assert_eq!(tree.child(root, "slot"), Some(d));
        assert_eq!(tree.parent(b), None);
        assert_eq!(tree.key(b), None);

        assert_eq!(tree.set_child(root, "slot", None).unwrap(), Some(d));
        assert_eq!(tree.child(root, "slot"), None);
        assert_eq!(tree.children(root), &[a, c]);
    }

    #[test]
    fn keyed_append_replaces_holder() {
        let (mut tree, root) = tree_with_root();
        let [a, b] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, Some("k")).unwrap();
        assert_eq!(tree.append_child(root, b, Some("k")).unwrap(), Some(a));
        assert_eq!(tree.children(root), &[b]);
        assert_eq!(tree.child(root, "k"), Some(b));
    }

    #[test]
    fn replace_child_keeps_key_and_position() {
        let (mut tree, root) = tree_with_root();
        let [a, b, c] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, Some("first")).unwrap();
        tree.append_child(root, b, None).unwrap();
        assert_eq!(tree.replace_child(root, c, a).unwrap(), a);
        assert_eq!(tree.children(root), &[c, b]);
        assert_eq!(tree.child(root, "first"), Some(c));
        assert_eq!(tree.key(c), Some("first"));
    }

    #[test]
    fn protocol_violations_leave_tree_unmodified() {
        let (mut tree, root) = tree_with_root();
        let [a, b, stranger] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, None).unwrap();
        tree.append_child(a, b, None).unwrap();

        assert_eq!(
            tree.insert_child(root, stranger, Some(b), None),
            Err(TreeError::TargetNotChild { parent: root, target: b })
        );
        assert_eq!(
            tree.append_child(b, root, None),
            Err(TreeError::CyclicInsert { parent: b, child: root })
        );
        assert_eq!(
            tree.append_child(a, a, None),
            Err(TreeError::CyclicInsert { parent: a, child: a })
        );
        assert_eq!(
            tree.remove_child(root, b),
            Err(TreeError::NotAChild { parent: root, child: b })
        );
        assert_eq!(tree.children(root), &[a]);
        assert_eq!(tree.children(a), &[b]);
        assert_eq!(tree.parent(stranger), None);
    }

    #[test]
    fn moving_between_parents() {
        let (mut tree, root) = tree_with_root();
        let [a, b, c] = core::array::from_fn(|_| tree.create_node());
        tree.append_child(root, a, None).unwrap();
        tree.append_child(root, b, None).unwrap();
        tree.append_child(a, c, Some("c")).unwrap();
        tree.cascade_mount(root).unwrap();

        tree.append_child(b, c, None).unwrap();
        assert_eq!(tree.children(a), &[] as &[NodeId]);
        assert_eq!(tree.child(a, "c"), None);
        assert_eq!(tree.parent(c), Some(b));
        assert!(tree.is_mounted(c));
    }

    #[test]
    fn destroy_requires_detached_node() {
        let (mut tree, root) = tree_with_root();
        let a = tree.create_node();
        tree.append_child(root, a, None).unwrap();
        assert_eq!(tree.destroy(a), Err(TreeError::StillAttached(a)));
        tree.cascade_mount(root).unwrap();
        assert_eq!(tree.destroy(root), Err(TreeError::StillAttached(root)));
        tree.cascade_unmount(root).unwrap();
        tree.destroy(root).unwrap();
        assert!(!tree.is_alive(a));
        assert!(tree.is_empty());
    }

    struct Stubborn;

    impl crate::facet::Facet<Model> for Stubborn {
        fn detached(&mut self, _: &mut Tree<Model>, node: NodeId) -> HookResult {
            Err(TreeError::hook(node, "stuck"))
        }
    }

    #[test]
    fn failed_destroy_frees_nothing() {
        let (mut tree, root) = tree_with_root();
        let a = tree.create_node();
        let b = tree.create_node();
        tree.append_child(root, a, None).unwrap();
        tree.append_child(root, b, None).unwrap();
        tree.attach_facet(b, Stubborn).unwrap();

        assert_eq!(tree.destroy(root), Err(TreeError::hook(b, "stuck")));
        for node in [root, a, b] {
            assert!(tree.is_alive(node));
        }
        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.len(), 3);

        // Still a working tree.
        tree.cascade_mount(root).unwrap();
        tree.cascade_unmount(root).unwrap();
        assert!(tree.detach_facet::<Stubborn>(b).is_err());
        assert_eq!(tree.facet_count(b), 0);
        tree.destroy(root).unwrap();
        assert!(tree.is_empty());
    }
}
