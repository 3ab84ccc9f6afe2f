// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Fastener: inheritable, precedence-arbitrated slots.
//!
//! A *fastener* is a named slot a node type declares: a property, a shared
//! service, or a keyed child link. Fasteners are registered once in a
//! [`FastenerRegistry`], which hands out typed [`Fastener<T>`] handles. Each
//! node type lists the fields it declares in a [`FastenerClass`], and each node
//! keeps the slots it has touched in a sparse [`FastenerStore`].
//!
//! ## Inheritance
//!
//! A fastener registered with [`Inherit::SameName`] or [`Inherit::Named`]
//! binds, when its owner mounts, to the nearest ancestor declaring the target
//! field with the same value type. While bound and not overridden, the slot
//! mirrors its super:
//!
//! - **Push**: a write is copied eagerly into every dependent it dominates,
//!   recursively down the bound subtree.
//! - **Pull**: a slot never touched resolves through its ancestors without
//!   being instantiated.
//!
//! ## Precedence
//!
//! Every slot carries a [`Precedence`]. A write below the slot's current
//! precedence is rejected, and a super only replaces a dependent's value when
//! its precedence is at least the dependent's.
//!
//! ## Hosts
//!
//! The algorithms span several stores, so they are written against the
//! [`FastenerHost`] trait, which a tree implements. [`FastenerHostExt`] is
//! implemented for every host.
//!
//! ```rust
//! use understory_fastener::{
//!     FastenerClass, FastenerHost, FastenerHostExt, FastenerId, FastenerMetadataBuilder,
//!     FastenerRegistry, FastenerStore, Precedence,
//! };
//!
//! // Two nodes, 1 is a child of 0.
//! struct Pair {
//!     registry: FastenerRegistry,
//!     class: FastenerClass,
//!     stores: [FastenerStore<usize>; 2],
//! }
//!
//! impl FastenerHost<usize> for Pair {
//!     fn registry(&self) -> &FastenerRegistry { &self.registry }
//!     fn parent_key(&self, key: usize) -> Option<usize> { (key == 1).then_some(0) }
//!     fn field_id(&self, _: usize, field: &str) -> Option<FastenerId> { self.class.field(field) }
//!     fn field_name(&self, _: usize, id: FastenerId) -> Option<&'static str> {
//!         self.class.field_name(id)
//!     }
//!     fn store(&self, key: usize) -> Option<&FastenerStore<usize>> { self.stores.get(key) }
//!     fn store_mut(&mut self, key: usize) -> Option<&mut FastenerStore<usize>> {
//!         self.stores.get_mut(key)
//!     }
//! }
//!
//! let mut registry = FastenerRegistry::new();
//! let font = registry.register(
//!     "font",
//!     FastenerMetadataBuilder::new(12.0_f64).inherits(true).build(),
//! );
//! let class = FastenerClass::builder("Node").field("font", font).build();
//! let mut pair = Pair {
//!     registry,
//!     class,
//!     stores: [FastenerStore::new(0), FastenerStore::new(1)],
//! };
//!
//! pair.mount_fasteners(0).unwrap();
//! pair.mount_fasteners(1).unwrap();
//! assert_eq!(pair.read_fastener(1, font).unwrap(), Some(12.0));
//!
//! pair.write_fastener(0, font, 16.0, Precedence::INTRINSIC).unwrap();
//! assert_eq!(pair.read_fastener(1, font).unwrap(), Some(16.0));
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod class;
mod error;
mod host;
mod id;
mod metadata;
mod precedence;
mod registry;
mod store;
mod value;

pub use class::{FastenerClass, FastenerClassBuilder};
pub use error::FastenerError;
pub use host::{FastenerHost, FastenerHostExt, WriteOutcome};
pub use id::{Fastener, FastenerId};
pub use metadata::{
    CoerceValueCallback, FastenerChangedCallback, FastenerKind, FastenerMetadata,
    FastenerMetadataBuilder, Inherit,
};
pub use precedence::Precedence;
pub use registry::{FastenerRegistration, FastenerRegistry};
pub use store::{FastenerSlot, FastenerStore, SlotRef, SlotState};
pub use value::ErasedValue;
