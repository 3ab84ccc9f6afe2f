// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observers and consumers.
//!
//! Observers are notified around structural changes, lifecycle transitions
//! and sub-phases. They receive no tree access and cannot fail; any callback
//! they do not implement is skipped.
//!
//! Consumers are identity tokens. A mounted node with at least one consumer
//! is *consuming*; see [`TreeConfig::consumer_gated`](crate::TreeConfig::consumer_gated).

use alloc::rc::Rc;
use core::cell::RefCell;

use smallvec::SmallVec;

use crate::error::TreeError;
use crate::facet::HookResult;
use crate::tree::Tree;
use crate::types::{Flavor, Lifecycle, NodeFlags, NodeId, Phase};

/// Shared handle to an observer.
pub type ObserverRef = Rc<RefCell<dyn Observer>>;

/// Callbacks around the changes of one node.
#[expect(unused_variables, reason = "default callbacks ignore their arguments")]
pub trait Observer {
    /// Before `child` is spliced into `node`.
    fn will_insert_child(&mut self, node: NodeId, child: NodeId, target: Option<NodeId>) {}

    /// After `child` was inserted into `node`.
    fn did_insert_child(&mut self, node: NodeId, child: NodeId) {}

    /// Before `child` is detached from `node`.
    fn will_remove_child(&mut self, node: NodeId, child: NodeId) {}

    /// After `child` was detached from `node`.
    fn did_remove_child(&mut self, node: NodeId, child: NodeId) {}

    /// Before the parent of `node` changes.
    fn will_set_parent(&mut self, node: NodeId, new_parent: Option<NodeId>, old_parent: Option<NodeId>) {}

    /// After the parent of `node` changed.
    fn did_set_parent(&mut self, node: NodeId, new_parent: Option<NodeId>, old_parent: Option<NodeId>) {}

    /// Before a lifecycle transition of `node`.
    fn will_lifecycle(&mut self, node: NodeId, event: Lifecycle) {}

    /// After a lifecycle transition of `node`.
    fn did_lifecycle(&mut self, node: NodeId, event: Lifecycle) {}

    /// Before a sub-phase runs on `node`.
    fn will_phase(&mut self, node: NodeId, phase: Phase) {}

    /// After a sub-phase ran on `node` and its subtree.
    fn did_phase(&mut self, node: NodeId, phase: Phase) {}
}

/// A token whose presence keeps a node consuming.
pub trait Consumer {
    /// Name used in diagnostics.
    fn consumer_name(&self) -> &str {
        "consumer"
    }
}

impl<F: Flavor> Tree<F> {
    /// Adds an observer and returns a typed handle to it.
    pub fn observe<O: Observer + 'static>(
        &mut self,
        node: NodeId,
        observer: O,
    ) -> Result<Rc<RefCell<O>>, TreeError> {
        let typed = Rc::new(RefCell::new(observer));
        self.add_observer(node, typed.clone())?;
        Ok(typed)
    }

    /// Adds an observer. Returns `false` if it was already registered.
    pub fn add_observer(&mut self, node: NodeId, observer: ObserverRef) -> Result<bool, TreeError> {
        let observers = &mut self.node_mut(node)?.observers;
        if observers.iter().any(|o| Rc::ptr_eq(o, &observer)) {
            return Ok(false);
        }
        observers.push(observer);
        Ok(true)
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn remove_observer(&mut self, node: NodeId, observer: &ObserverRef) -> Result<bool, TreeError> {
        let observers = &mut self.node_mut(node)?.observers;
        let before = observers.len();
        observers.retain(|o| !Rc::ptr_eq(o, observer));
        Ok(observers.len() != before)
    }

    /// Returns the number of observers of `node`.
    pub fn observer_count(&self, node: NodeId) -> usize {
        self.node(node).map_or(0, |data| data.observers.len())
    }

    /// Notifies every observer of `node`.
    ///
    /// Observers never see the tree, so one can only be busy if its owner
    /// holds a borrow across a tree call; it misses the notification and a
    /// warning is logged.
    pub(crate) fn each_observer(&self, node: NodeId, mut notify: impl FnMut(&mut dyn Observer)) {
        let Ok(data) = self.node(node) else {
            return;
        };
        let observers: SmallVec<[ObserverRef; 2]> = data.observers.iter().cloned().collect();
        for observer in &observers {
            match observer.try_borrow_mut() {
                Ok(mut observer) => notify(&mut *observer),
                Err(_) => tracing::warn!(%node, "busy observer missed a notification"),
            }
        }
    }

    /// Adds a consumer. Returns `false` if it was already registered.
    ///
    /// A mounted node starts consuming with its first consumer.
    pub fn add_consumer(&mut self, node: NodeId, consumer: Rc<dyn Consumer>) -> Result<bool, TreeError> {
        let consumers = &mut self.node_mut(node)?.consumers;
        if consumers.iter().any(|c| Rc::ptr_eq(c, &consumer)) {
            return Ok(false);
        }
        tracing::trace!(%node, consumer = consumer.consumer_name(), "add consumer");
        consumers.push(consumer);
        self.start_consuming(node)?;
        Ok(true)
    }

    /// Removes a consumer. Returns `false` if it was not registered.
    ///
    /// The node stops consuming when its last consumer leaves.
    pub fn remove_consumer(&mut self, node: NodeId, consumer: &Rc<dyn Consumer>) -> Result<bool, TreeError> {
        let consumers = &mut self.node_mut(node)?.consumers;
        let before = consumers.len();
        consumers.retain(|c| !Rc::ptr_eq(c, consumer));
        let removed = consumers.len() != before;
        if consumers.is_empty() {
            self.stop_consuming(node)?;
        }
        Ok(removed)
    }

    /// Returns the number of consumers of `node`.
    pub fn consumer_count(&self, node: NodeId) -> usize {
        self.node(node).map_or(0, |data| data.consumers.len())
    }

    /// Starts consuming if mounted with consumers and not consuming yet.
    pub(crate) fn start_consuming(&mut self, node: NodeId) -> HookResult {
        let data = self.node(node)?;
        if data.flags.contains(NodeFlags::CONSUMING)
            || !data.flags.contains(NodeFlags::MOUNTED)
            || data.consumers.is_empty()
        {
            return Ok(());
        }
        let event = Lifecycle::StartConsuming;
        self.lifecycle_will(node, event)?;
        self.node_mut(node)?.flags |= NodeFlags::CONSUMING;
        self.lifecycle_on(node, event)?;
        self.lifecycle_did(node, event)?;
        if self.config().consumer_gated() {
            self.propagate_pending(node)?;
        }
        Ok(())
    }

    /// Stops consuming if consuming.
    pub(crate) fn stop_consuming(&mut self, node: NodeId) -> HookResult {
        if !self.flags(node)?.contains(NodeFlags::CONSUMING) {
            return Ok(());
        }
        let event = Lifecycle::StopConsuming;
        self.lifecycle_will(node, event)?;
        self.node_mut(node)?.flags -= NodeFlags::CONSUMING;
        self.lifecycle_on(node, event)?;
        self.lifecycle_did(node, event)
    }
}
