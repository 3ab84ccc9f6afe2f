// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Lifecycle: a retained tree with lifecycle and dirty cascades.
//!
//! A [`Tree`] owns nodes in a generational arena. Each node has ordered,
//! optionally keyed children, attachable [`Facet`]s, [`Observer`]s,
//! [`Consumer`]s and a store of fasteners (see [`understory_fastener`]).
//!
//! - **Lifecycle**: [`cascade_mount`](Tree::cascade_mount),
//!   [`cascade_unmount`](Tree::cascade_unmount),
//!   [`cascade_power`](Tree::cascade_power) and
//!   [`cascade_unpower`](Tree::cascade_unpower) walk a subtree, calling
//!   `will`, `on` and `did` hooks around each node.
//! - **Dirty passes**: [`require_update`](Tree::require_update) records
//!   pending [`NodeFlags`] and back-propagates the pass bit to every ancestor.
//!   The root hands the request to an [`UpdateScheduler`];
//!   [`flush_updates`](Tree::flush_updates) then runs two top-down passes,
//!   each made of conditional sub-phases.
//! - **Deferred removal**: removing a node while a cascade iterates its
//!   parent only flags it; the cascade detaches it before returning.
//!
//! ## Flavors
//!
//! The engine is generic over a [`Flavor`]. [`Model`] trees run *analyze*
//! (mutate, aggregate, correlate) then *refresh* (validate, reconcile).
//! [`View`] trees run *process* (resize, scroll, change, animate, project)
//! then *display* (layout, render, rasterize, composite).
//!
//! ```rust
//! use understory_lifecycle::{
//!     Environment, Facet, HookResult, Model, NodeFlags, NodeId, Phase, Tree,
//! };
//!
//! #[derive(Default)]
//! struct Trace(Vec<(NodeId, Phase)>);
//!
//! impl Facet<Model> for Trace {
//!     fn on_phase(
//!         &mut self,
//!         _: &mut Tree<Model>,
//!         node: NodeId,
//!         phase: Phase,
//!         _: &Environment,
//!     ) -> HookResult {
//!         self.0.push((node, phase));
//!         Ok(())
//!     }
//! }
//!
//! let mut tree = Tree::<Model>::new();
//! let root = tree.create_node();
//! let leaf = tree.create_node();
//! tree.append_child(root, leaf, None).unwrap();
//! let trace = tree.attach_facet(leaf, Trace::default()).unwrap();
//! tree.cascade_mount(root).unwrap();
//!
//! tree.require_update(leaf, NodeFlags::NEEDS_MUTATE, false).unwrap();
//! assert!(tree.flags(root).unwrap().contains(NodeFlags::NEEDS_ANALYZE));
//!
//! let report = tree.flush_updates();
//! assert_eq!(report.updated, [root]);
//! assert_eq!(trace.borrow().0, [(leaf, Phase::Mutate)]);
//! ```
//!
//! ## Re-entrancy
//!
//! Hooks receive the tree mutably and may call any operation. Facets live
//! behind `Rc<RefCell<_>>`; a nested call that reaches a facet already
//! executing is queued and delivered when that facet's hook returns.
//! Transitions that are not allowed in the current state fail with a
//! [`TreeError`].
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod cascade;
mod config;
mod env;
mod error;
mod facet;
mod fasteners;
mod observer;
mod refresh;
mod tree;
mod types;
mod update;

pub use config::{ImmediatePolicy, TreeConfig, TreeConfigBuilder};
pub use env::Environment;
pub use error::TreeError;
pub use facet::{Facet, FacetRef, HookResult};
pub use observer::{Consumer, Observer, ObserverRef};
pub use refresh::{RefreshManager, SchedulerStats, UpdateReport, UpdateScheduler};
pub use tree::Tree;
pub use types::{Flavor, Lifecycle, Model, NodeFlags, NodeId, Pass, PassInfo, Phase, View};

pub use understory_fastener;
