// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Facets: attachable behavior hosted by a node.
//!
//! A node carries an ordered list of facets and an optional behavior, which
//! is itself a [`Facet`] run after the list. Every cascade step calls the
//! matching hook on each of them in attachment order.
//!
//! Facets are stored as `Rc<RefCell<_>>`. A hook receives the tree mutably,
//! so it may call back into any tree operation. If that operation reaches a
//! facet that is already executing, the call is queued and delivered as soon
//! as the facet's outer hook returns. An error from a queued call surfaces
//! from the operation that delivered it.
//!
//! The value-returning chains (`needs_update`, `needs_pass`,
//! `extend_environment`) cannot wait; a busy facet is left out of the fold
//! and a warning is logged.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::any::{Any, TypeId};
use core::cell::RefCell;

use smallvec::SmallVec;

use crate::env::Environment;
use crate::error::TreeError;
use crate::tree::Tree;
use crate::types::{Flavor, Lifecycle, NodeFlags, NodeId, Pass, PassInfo, Phase};

/// Result of a hook.
pub type HookResult = Result<(), TreeError>;

/// Shared handle to a type-erased facet.
pub type FacetRef<F> = Rc<RefCell<dyn Facet<F>>>;

/// Behavior attached to a node.
///
/// Every method has a no-op default; implement the ones you need.
///
/// ```rust
/// use understory_lifecycle::{
///     Environment, Facet, HookResult, Model, NodeFlags, NodeId, Phase, Tree,
/// };
///
/// #[derive(Default)]
/// struct CountMutations(u32);
///
/// impl Facet<Model> for CountMutations {
///     fn on_phase(
///         &mut self,
///         _: &mut Tree<Model>,
///         _: NodeId,
///         phase: Phase,
///         _: &Environment,
///     ) -> HookResult {
///         if phase == Phase::Mutate {
///             self.0 += 1;
///         }
///         Ok(())
///     }
/// }
///
/// let mut tree = Tree::<Model>::new();
/// let root = tree.create_node();
/// let counter = tree.attach_facet(root, CountMutations::default()).unwrap();
/// tree.cascade_mount(root).unwrap();
///
/// tree.require_update(root, NodeFlags::NEEDS_MUTATE, false).unwrap();
/// tree.flush_updates();
/// assert_eq!(counter.borrow().0, 1);
/// ```
#[expect(unused_variables, reason = "default hooks ignore their arguments")]
pub trait Facet<F: Flavor> {
    /// The facet was attached to `node`.
    fn attached(&mut self, tree: &mut Tree<F>, node: NodeId) -> HookResult {
        Ok(())
    }

    /// The facet is being detached from `node`.
    fn detached(&mut self, tree: &mut Tree<F>, node: NodeId) -> HookResult {
        Ok(())
    }

    /// Before a lifecycle transition touches `node`.
    fn will_lifecycle(&mut self, tree: &mut Tree<F>, node: NodeId, event: Lifecycle) -> HookResult {
        Ok(())
    }

    /// After `node`'s own state changed, before its children are visited
    /// (mount, power) or after they were (unmount, unpower).
    fn on_lifecycle(&mut self, tree: &mut Tree<F>, node: NodeId, event: Lifecycle) -> HookResult {
        Ok(())
    }

    /// After the transition completed for the whole subtree.
    fn did_lifecycle(&mut self, tree: &mut Tree<F>, node: NodeId, event: Lifecycle) -> HookResult {
        Ok(())
    }

    /// Before `child` is spliced into `node`, ahead of `target` if given.
    fn will_insert_child(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        child: NodeId,
        target: Option<NodeId>,
    ) -> HookResult {
        Ok(())
    }

    /// After `child` was spliced into `node`.
    fn on_insert_child(&mut self, tree: &mut Tree<F>, node: NodeId, child: NodeId) -> HookResult {
        Ok(())
    }

    /// After the insertion hooks ran.
    fn did_insert_child(&mut self, tree: &mut Tree<F>, node: NodeId, child: NodeId) -> HookResult {
        Ok(())
    }

    /// Before `child` is detached from `node`.
    fn will_remove_child(&mut self, tree: &mut Tree<F>, node: NodeId, child: NodeId) -> HookResult {
        Ok(())
    }

    /// After `child` was spliced out of `node`.
    fn on_remove_child(&mut self, tree: &mut Tree<F>, node: NodeId, child: NodeId) -> HookResult {
        Ok(())
    }

    /// After the removal hooks ran.
    fn did_remove_child(&mut self, tree: &mut Tree<F>, node: NodeId, child: NodeId) -> HookResult {
        Ok(())
    }

    /// Rewrites the bits of an update request passing through `node`.
    fn needs_update(
        &mut self,
        tree: &Tree<F>,
        node: NodeId,
        bits: NodeFlags,
        immediate: bool,
    ) -> NodeFlags {
        bits
    }

    /// New bits were required on `node`.
    fn on_require_update(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        bits: NodeFlags,
        immediate: bool,
    ) -> HookResult {
        Ok(())
    }

    /// An update request for `target` is passing through `node`.
    fn on_request_update(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        target: NodeId,
        bits: NodeFlags,
        immediate: bool,
    ) -> HookResult {
        Ok(())
    }

    /// Extends the environment seen by `node` and its subtree.
    fn extend_environment(&mut self, tree: &Tree<F>, node: NodeId, env: Environment) -> Environment {
        env
    }

    /// Rewrites the flags a pass will run with on `node`.
    fn needs_pass(
        &mut self,
        tree: &Tree<F>,
        node: NodeId,
        pass: Pass,
        flags: NodeFlags,
        env: &Environment,
    ) -> NodeFlags {
        flags
    }

    /// Before any sub-phase of `pass` runs on `node`.
    fn will_pass(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        pass: Pass,
        flags: NodeFlags,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// After every included sub-phase's `will` hook, before their `on` hooks.
    fn on_pass(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        pass: Pass,
        flags: NodeFlags,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// After the children were visited and every sub-phase's `did` hook ran.
    fn did_pass(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        pass: Pass,
        flags: NodeFlags,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// A sub-phase is starting; its pending bit is already cleared.
    fn will_phase(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        phase: Phase,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// The sub-phase's main work.
    fn on_phase(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        phase: Phase,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// The sub-phase finished, children included.
    fn did_phase(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        phase: Phase,
        env: &Environment,
    ) -> HookResult {
        Ok(())
    }

    /// Wraps the walk over `node`'s children.
    ///
    /// Call `walk` to continue with the next facet and finally the default
    /// walk; return without calling it to skip the children for this pass.
    fn traverse_children(
        &mut self,
        tree: &mut Tree<F>,
        node: NodeId,
        pass: Pass,
        flags: NodeFlags,
        env: &Environment,
        walk: &mut dyn FnMut(&mut Tree<F>) -> HookResult,
    ) -> HookResult {
        walk(tree)
    }
}

pub(crate) struct FacetEntry<F: Flavor> {
    pub(crate) key: Option<String>,
    pub(crate) type_id: TypeId,
    pub(crate) any: Rc<dyn Any>,
    pub(crate) hook: FacetRef<F>,
}

impl<F: Flavor> FacetEntry<F> {
    fn new<T: Facet<F> + 'static>(key: Option<String>, facet: T) -> (Self, Rc<RefCell<T>>) {
        let typed = Rc::new(RefCell::new(facet));
        let entry = Self {
            key,
            type_id: TypeId::of::<T>(),
            any: typed.clone(),
            hook: typed.clone(),
        };
        (entry, typed)
    }

    fn downcast<T: 'static>(&self) -> Option<Rc<RefCell<T>>> {
        self.any.clone().downcast::<RefCell<T>>().ok()
    }
}

impl<F: Flavor> Clone for FacetEntry<F> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            type_id: self.type_id,
            any: self.any.clone(),
            hook: self.hook.clone(),
        }
    }
}

pub(crate) type HookList<F> = SmallVec<[FacetRef<F>; 4]>;

type HookCall<F> = Box<dyn FnOnce(&mut dyn Facet<F>, &mut Tree<F>) -> HookResult>;

/// A hook call that reached a facet while it was executing.
pub(crate) struct DeferredHook<F: Flavor> {
    node: NodeId,
    hook: FacetRef<F>,
    call: HookCall<F>,
}

impl<F: Flavor> Tree<F> {
    /// Attaches a facet after the existing ones.
    ///
    /// Runs `attached`, then the mount (and power) lifecycle hooks of the new
    /// facet if the node is already mounted (powered).
    pub fn attach_facet<T: Facet<F> + 'static>(
        &mut self,
        node: NodeId,
        facet: T,
    ) -> Result<Rc<RefCell<T>>, TreeError> {
        self.attach_entry(node, None, facet)
    }

    /// Attaches a facet under `key`, detaching any facet holding that key.
    pub fn attach_facet_keyed<T: Facet<F> + 'static>(
        &mut self,
        node: NodeId,
        key: &str,
        facet: T,
    ) -> Result<Rc<RefCell<T>>, TreeError> {
        self.detach_facet_keyed(node, key)?;
        self.attach_entry(node, Some(key.into()), facet)
    }

    fn attach_entry<T: Facet<F> + 'static>(
        &mut self,
        node: NodeId,
        key: Option<String>,
        facet: T,
    ) -> Result<Rc<RefCell<T>>, TreeError> {
        let (entry, typed) = FacetEntry::new(key, facet);
        let hook = entry.hook.clone();
        self.node_mut(node)?.facets.push(entry);
        self.call_facet(node, &hook, move |facet, tree| facet.attached(tree, node))?;
        self.catch_up_facet(&hook, node)?;
        Ok(typed)
    }

    /// Detaches the first facet of type `T`.
    pub fn detach_facet<T: 'static>(
        &mut self,
        node: NodeId,
    ) -> Result<Option<Rc<RefCell<T>>>, TreeError> {
        let found = self
            .node(node)?
            .facets
            .iter()
            .find(|entry| entry.type_id == TypeId::of::<T>())
            .cloned();
        let Some(entry) = found else {
            return Ok(None);
        };
        self.detach_entry(node, &entry)?;
        Ok(entry.downcast())
    }

    /// Detaches the facet holding `key`. Returns `true` if one was found.
    pub fn detach_facet_keyed(&mut self, node: NodeId, key: &str) -> Result<bool, TreeError> {
        let found = self
            .node(node)?
            .facets
            .iter()
            .find(|entry| entry.key.as_deref() == Some(key))
            .cloned();
        let Some(entry) = found else {
            return Ok(false);
        };
        self.detach_entry(node, &entry)?;
        Ok(true)
    }

    fn detach_entry(&mut self, node: NodeId, entry: &FacetEntry<F>) -> HookResult {
        let hook = entry.hook.clone();
        let result = self
            .wind_down_facet(&hook, node)
            .and_then(|()| self.call_facet(node, &hook, move |facet, tree| facet.detached(tree, node)));
        let data = self.node_mut(node)?;
        data.facets.retain(|e| !Rc::ptr_eq(&e.hook, &hook));
        if data
            .behavior
            .as_ref()
            .is_some_and(|b| Rc::ptr_eq(&b.hook, &hook))
        {
            data.behavior = None;
        }
        result
    }

    /// Sets the node's own behavior, run after every facet.
    ///
    /// A previous behavior is detached first.
    pub fn set_behavior<T: Facet<F> + 'static>(
        &mut self,
        node: NodeId,
        behavior: T,
    ) -> Result<Rc<RefCell<T>>, TreeError> {
        if let Some(old) = self.node(node)?.behavior.clone() {
            self.detach_entry(node, &old)?;
        }
        let (entry, typed) = FacetEntry::new(None, behavior);
        let hook = entry.hook.clone();
        self.node_mut(node)?.behavior = Some(entry);
        self.call_facet(node, &hook, move |facet, tree| facet.attached(tree, node))?;
        self.catch_up_facet(&hook, node)?;
        Ok(typed)
    }

    /// Returns the node's behavior as a `T`.
    pub fn behavior<T: 'static>(&self, node: NodeId) -> Option<Rc<RefCell<T>>> {
        self.node(node).ok()?.behavior.as_ref()?.downcast()
    }

    /// Returns the first facet of type `T`.
    pub fn facet<T: 'static>(&self, node: NodeId) -> Option<Rc<RefCell<T>>> {
        self.node(node)
            .ok()?
            .facets
            .iter()
            .find(|entry| entry.type_id == TypeId::of::<T>())
            .and_then(FacetEntry::downcast)
    }

    /// Returns the first facet of type `T`, or [`TreeError::MissingFacet`].
    pub fn require_facet<T: 'static>(&self, node: NodeId) -> Result<Rc<RefCell<T>>, TreeError> {
        self.node(node)?;
        self.facet(node).ok_or(TreeError::MissingFacet {
            node,
            name: core::any::type_name::<T>(),
        })
    }

    /// Returns the facet attached under `key`.
    pub fn facet_keyed(&self, node: NodeId, key: &str) -> Option<FacetRef<F>> {
        self.node(node)
            .ok()?
            .facets
            .iter()
            .find(|entry| entry.key.as_deref() == Some(key))
            .map(|entry| entry.hook.clone())
    }

    /// Returns the number of attached facets, the behavior excluded.
    pub fn facet_count(&self, node: NodeId) -> usize {
        self.node(node).map_or(0, |data| data.facets.len())
    }

    /// Snapshot of the hooks of `node`: facets in order, then the behavior.
    pub(crate) fn hooks(&self, node: NodeId) -> Result<HookList<F>, TreeError> {
        let data = self.node(node)?;
        Ok(data
            .facets
            .iter()
            .chain(data.behavior.as_ref())
            .map(|entry| entry.hook.clone())
            .collect())
    }

    /// Calls one hook of `node`'s facet `hook`.
    ///
    /// A facet that is already executing gets the call once it returns.
    pub(crate) fn call_facet(
        &mut self,
        node: NodeId,
        hook: &FacetRef<F>,
        call: impl FnOnce(&mut dyn Facet<F>, &mut Self) -> HookResult + 'static,
    ) -> HookResult {
        let Ok(mut facet) = hook.try_borrow_mut() else {
            tracing::trace!(%node, "facet busy, call deferred");
            self.deferred.push(DeferredHook {
                node,
                hook: hook.clone(),
                call: Box::new(call),
            });
            return Ok(());
        };
        let result = call(&mut *facet, self);
        drop(facet);
        result?;
        self.run_deferred()
    }

    /// Calls a hook on every facet of `node`, then on its behavior.
    pub(crate) fn each_facet<C>(&mut self, node: NodeId, call: C) -> HookResult
    where
        C: FnOnce(&mut dyn Facet<F>, &mut Self) -> HookResult + Clone + 'static,
    {
        for hook in &self.hooks(node)? {
            self.call_facet(node, hook, call.clone())?;
        }
        Ok(())
    }

    /// Delivers queued calls whose facet is free again.
    ///
    /// Calls to facets that are still busy stay queued, calls for destroyed
    /// nodes are dropped. Stops at the first error; the calls after it stay
    /// queued.
    fn run_deferred(&mut self) -> HookResult {
        if self.deferred.is_empty() {
            return Ok(());
        }
        let mut queue = core::mem::take(&mut self.deferred).into_iter();
        let mut failure = None;
        for deferred in queue.by_ref() {
            if !self.is_alive(deferred.node) {
                tracing::trace!(node = %deferred.node, "dropped call for a destroyed node");
                continue;
            }
            let hook = deferred.hook.clone();
            let Ok(mut facet) = hook.try_borrow_mut() else {
                self.deferred.push(deferred);
                continue;
            };
            let result = (deferred.call)(&mut *facet, self);
            drop(facet);
            if let Err(error) = result {
                failure = Some(error);
                break;
            }
        }
        self.deferred.extend(queue);
        failure.map_or(Ok(()), Err)
    }

    /// Folds the `needs_update` chain.
    pub(crate) fn needs_update_chain(
        &self,
        node: NodeId,
        mut bits: NodeFlags,
        immediate: bool,
    ) -> Result<NodeFlags, TreeError> {
        for hook in &self.hooks(node)? {
            match hook.try_borrow_mut() {
                Ok(mut facet) => bits = facet.needs_update(self, node, bits, immediate),
                Err(_) => tracing::warn!(%node, "busy facet left out of needs_update"),
            }
        }
        Ok(bits)
    }

    /// Folds the `needs_pass` chain.
    pub(crate) fn needs_pass_chain(
        &self,
        node: NodeId,
        pass: Pass,
        mut flags: NodeFlags,
        env: &Environment,
    ) -> Result<NodeFlags, TreeError> {
        for hook in &self.hooks(node)? {
            match hook.try_borrow_mut() {
                Ok(mut facet) => flags = facet.needs_pass(self, node, pass, flags, env),
                Err(_) => tracing::warn!(%node, ?pass, "busy facet left out of needs_pass"),
            }
        }
        Ok(flags)
    }

    /// Folds the `extend_environment` chain.
    pub(crate) fn extend_environment(
        &self,
        node: NodeId,
        env: &Environment,
    ) -> Result<Environment, TreeError> {
        let mut env = env.clone();
        for hook in &self.hooks(node)? {
            match hook.try_borrow_mut() {
                Ok(mut facet) => env = facet.extend_environment(self, node, env),
                Err(_) => tracing::warn!(%node, "busy facet left out of extend_environment"),
            }
        }
        Ok(env)
    }

    /// Offers the child walk to each hook in turn; the last one walks.
    pub(crate) fn traverse_chain(
        &mut self,
        node: NodeId,
        info: PassInfo,
        flags: NodeFlags,
        env: &Environment,
        hooks: &[FacetRef<F>],
    ) -> HookResult {
        let Some((first, rest)) = hooks.split_first() else {
            return self.walk_children(node, info, flags, env);
        };
        let Ok(mut facet) = first.try_borrow_mut() else {
            tracing::warn!(%node, pass = ?info.pass, "busy facet left out of the child walk");
            return self.traverse_chain(node, info, flags, env, rest);
        };
        let result = facet.traverse_children(self, node, info.pass, flags, env, &mut |tree| {
            tree.traverse_chain(node, info, flags, env, rest)
        });
        drop(facet);
        result?;
        self.run_deferred()
    }

    /// Replays mount and power on a facet attached to a live node.
    fn catch_up_facet(&mut self, hook: &FacetRef<F>, node: NodeId) -> HookResult {
        let flags = self.flags(node)?;
        if flags.contains(NodeFlags::MOUNTED) {
            self.facet_transition(hook, node, Lifecycle::Mount)?;
        }
        if flags.contains(NodeFlags::POWERED) {
            self.facet_transition(hook, node, Lifecycle::Power)?;
        }
        Ok(())
    }

    /// Replays unpower and unmount on a facet leaving a live node.
    fn wind_down_facet(&mut self, hook: &FacetRef<F>, node: NodeId) -> HookResult {
        let flags = self.flags(node)?;
        if flags.contains(NodeFlags::POWERED) {
            self.facet_transition(hook, node, Lifecycle::Unpower)?;
        }
        if flags.contains(NodeFlags::MOUNTED) {
            self.facet_transition(hook, node, Lifecycle::Unmount)?;
        }
        Ok(())
    }

    fn facet_transition(&mut self, hook: &FacetRef<F>, node: NodeId, event: Lifecycle) -> HookResult {
        self.call_facet(node, hook, move |facet, tree| {
            facet.will_lifecycle(tree, node, event)?;
            facet.on_lifecycle(tree, node, event)?;
            facet.did_lifecycle(tree, node, event)
        })
    }
}
