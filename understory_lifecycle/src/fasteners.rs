// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tree as a fastener host.
//!
//! Each node owns a [`FastenerStore`] shaped by the
//! [`FastenerClass`](understory_fastener::FastenerClass) it was created with.
//! Inheriting fields are instantiated and bound when the node mounts; other
//! slots are created on first write. Writes go
//! through [`Tree::set_value`] so every owner whose value changed receives the
//! flavor's decoherence bit plus the fastener's own update bits.

use understory_fastener::{
    ErasedValue, Fastener, FastenerError, FastenerHost, FastenerHostExt, FastenerId, FastenerKind,
    FastenerRegistry, FastenerStore, Precedence, WriteOutcome,
};

use crate::error::TreeError;
use crate::facet::HookResult;
use crate::tree::Tree;
use crate::types::{Flavor, NodeFlags, NodeId};

impl<F: Flavor> FastenerHost<NodeId> for Tree<F> {
    fn registry(&self) -> &FastenerRegistry {
        &self.registry
    }

    fn parent_key(&self, key: NodeId) -> Option<NodeId> {
        self.parent(key)
    }

    fn field_id(&self, key: NodeId, field: &str) -> Option<FastenerId> {
        self.node(key).ok()?.class.field(field)
    }

    fn field_name(&self, key: NodeId, id: FastenerId) -> Option<&'static str> {
        self.node(key).ok()?.class.field_name(id)
    }

    fn store(&self, key: NodeId) -> Option<&FastenerStore<NodeId>> {
        self.node(key).ok().map(|data| &data.fasteners)
    }

    fn store_mut(&mut self, key: NodeId) -> Option<&mut FastenerStore<NodeId>> {
        self.node_mut(key).ok().map(|data| &mut data.fasteners)
    }

    fn ambient(&self, id: FastenerId) -> Option<&ErasedValue> {
        self.ambient.get(&id)
    }
}

impl<F: Flavor> Tree<F> {
    /// Binds the node's slots on mount, instantiating every inheriting field.
    pub(crate) fn bind_fasteners(&mut self, node: NodeId) -> HookResult {
        self.mount_fasteners(node)?;
        let class = self.node(node)?.class.clone();
        for (_, id) in class.fields() {
            if self.registry.inherit(id).inherits() {
                self.ensure_slot(node, id)?;
            }
        }
        Ok(())
    }

    /// Writes an extrinsic value.
    pub fn set_value<T: Clone + 'static>(
        &mut self,
        node: NodeId,
        fastener: Fastener<T>,
        value: T,
    ) -> Result<WriteOutcome<NodeId>, TreeError> {
        self.set_value_with(node, fastener, value, Precedence::EXTRINSIC)
    }

    /// Writes a value at `precedence`.
    ///
    /// A write below the slot's current precedence is rejected and reported
    /// as [`WriteOutcome::Rejected`]. An applied write updates every inheriting
    /// dependent and requires an update on each owner whose value changed.
    pub fn set_value_with<T: Clone + 'static>(
        &mut self,
        node: NodeId,
        fastener: Fastener<T>,
        value: T,
        precedence: Precedence,
    ) -> Result<WriteOutcome<NodeId>, TreeError> {
        self.node(node)?;
        let outcome = self.write_fastener(node, fastener, value, precedence)?;
        self.decohere(fastener.id(), outcome.affected())?;
        Ok(outcome)
    }

    /// Reads a value: own or inherited, then provided, then the default.
    pub fn value<T: Clone + 'static>(
        &self,
        node: NodeId,
        fastener: Fastener<T>,
    ) -> Result<Option<T>, TreeError> {
        self.node(node)?;
        Ok(self.read_fastener(node, fastener)?)
    }

    /// Reads a value that must exist.
    pub fn require_value<T: Clone + 'static>(
        &self,
        node: NodeId,
        fastener: Fastener<T>,
    ) -> Result<T, TreeError> {
        self.node(node)?;
        Ok(self.require_fastener(node, fastener)?)
    }

    /// Reads a value, using `fallback` when nothing supplies one.
    pub fn value_or<T: Clone + 'static>(
        &self,
        node: NodeId,
        fastener: Fastener<T>,
        fallback: T,
    ) -> Result<T, TreeError> {
        Ok(self.value(node, fastener)?.unwrap_or(fallback))
    }

    /// Returns `true` if the node's slot currently mirrors its super.
    pub fn is_inherited<T>(&self, node: NodeId, fastener: Fastener<T>) -> bool {
        self.fastener_slot(node, fastener.id())
            .is_some_and(|slot| slot.is_inherited())
    }

    /// Returns the precedence of the node's slot, if instantiated.
    pub fn precedence<T>(&self, node: NodeId, fastener: Fastener<T>) -> Option<Precedence> {
        self.fastener_slot(node, fastener.id())
            .map(|slot| slot.precedence())
    }

    /// Changes a slot's precedence, inheriting or un-inheriting as needed.
    pub fn set_precedence<T>(
        &mut self,
        node: NodeId,
        fastener: Fastener<T>,
        precedence: Precedence,
    ) -> HookResult {
        self.node(node)?;
        let affected = self.set_fastener_precedence(node, fastener.id(), precedence)?;
        self.decohere(fastener.id(), &affected)
    }

    /// Drops an explicit value; a bound slot re-inherits.
    pub fn reset_value<T>(&mut self, node: NodeId, fastener: Fastener<T>) -> HookResult {
        self.node(node)?;
        let affected = self.reset_fastener(node, fastener.id())?;
        self.decohere(fastener.id(), &affected)
    }

    /// Provides a tree-wide value for slots that are not bound to a super.
    pub fn provide<T: 'static>(&mut self, fastener: Fastener<T>, value: T) -> HookResult {
        self.check_type::<T>(fastener.id())?;
        self.ambient.insert(fastener.id(), ErasedValue::new(value));
        Ok(())
    }

    /// Withdraws a provided value. Returns `true` if one was set.
    pub fn withdraw<T>(&mut self, fastener: Fastener<T>) -> bool {
        self.ambient.remove(&fastener.id()).is_some()
    }

    /// Sets the child a link fastener points at.
    ///
    /// The child is held under the field name the node's class declares the
    /// link as; see [`set_child`](Self::set_child).
    pub fn set_link(
        &mut self,
        node: NodeId,
        fastener: Fastener<Option<NodeId>>,
        child: Option<NodeId>,
    ) -> Result<Option<NodeId>, TreeError> {
        let field = self.link_field(node, fastener)?;
        self.set_child(node, field, child)
    }

    /// Returns the child a link fastener points at.
    pub fn link(&self, node: NodeId, fastener: Fastener<Option<NodeId>>) -> Result<Option<NodeId>, TreeError> {
        let field = self.link_field(node, fastener)?;
        Ok(self.child(node, field))
    }

    fn link_field(&self, node: NodeId, fastener: Fastener<Option<NodeId>>) -> Result<&'static str, TreeError> {
        self.node(node)?;
        let id = fastener.id();
        let name = self.check_type::<Option<NodeId>>(id)?;
        let is_link = self
            .registry
            .get(id)
            .is_some_and(|registration| registration.kind() == FastenerKind::Link);
        if !is_link {
            return Err(FastenerError::TypeMismatch { name }.into());
        }
        Ok(self
            .field_name(node, id)
            .ok_or(FastenerError::NotDeclared { name })?)
    }

    /// Requires the decoherence bits of `id` on every owner in `owners`.
    fn decohere(&mut self, id: FastenerId, owners: &[NodeId]) -> HookResult {
        if owners.is_empty() {
            return Ok(());
        }
        let bits = F::DECOHERENT | NodeFlags::from_bits_truncate(self.registry.update_bits(id));
        tracing::trace!(%id, owners = owners.len(), ?bits, "fastener changed");
        for &owner in owners {
            self.require_update(owner, bits, false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Model, View};
    use alloc::rc::Rc;
    use understory_fastener::{FastenerClass, FastenerMetadataBuilder};

    #[test]
    fn writes_decohere_every_affected_owner() {
        let mut tree = Tree::<View>::new();
        let opacity = tree.registry_mut().register(
            "opacity",
            FastenerMetadataBuilder::new(1.0_f32)
                .inherits(true)
                .requires_update(NodeFlags::NEEDS_RENDER.bits())
                .build(),
        );
        let class = Rc::new(FastenerClass::builder("Layer").field("opacity", opacity).build());
        let root = tree.create_node_with(class.clone());
        let child = tree.create_node_with(class);
        tree.append_child(root, child, None).unwrap();
        tree.cascade_mount(root).unwrap();
        assert_eq!(tree.value(child, opacity).unwrap(), Some(1.0));

        tree.set_value(root, opacity, 0.5).unwrap();
        assert_eq!(tree.value(child, opacity).unwrap(), Some(0.5));
        assert!(tree.is_inherited(child, opacity));
        let flags = tree.flags(child).unwrap();
        assert!(flags.contains(NodeFlags::NEEDS_CHANGE | NodeFlags::NEEDS_RENDER));
        assert!(flags.contains(NodeFlags::NEEDS_PROCESS | NodeFlags::NEEDS_DISPLAY));
    }

    #[test]
    fn reads_fall_back_to_provided_then_default() {
        let mut tree = Tree::<Model>::new();
        let locale = tree.registry_mut().register(
            "locale",
            FastenerMetadataBuilder::new(alloc::string::String::from("en"))
                .inherits(true)
                .build(),
        );
        let class = Rc::new(FastenerClass::builder("Doc").field("locale", locale).build());
        let node = tree.create_node_with(class);
        tree.cascade_mount(node).unwrap();

        assert_eq!(tree.require_value(node, locale).unwrap(), "en");
        tree.provide(locale, "fr".into()).unwrap();
        assert_eq!(tree.require_value(node, locale).unwrap(), "fr");
        assert!(tree.withdraw(locale));
        assert_eq!(tree.value_or(node, locale, "de".into()).unwrap(), "en");
    }

    #[test]
    fn missing_values_are_errors() {
        let mut tree = Tree::<Model>::new();
        let source = tree
            .registry_mut()
            .register("source", FastenerMetadataBuilder::<u32>::empty().build());
        let class = Rc::new(FastenerClass::builder("Feed").field("source", source).build());
        let node = tree.create_node_with(class);
        assert_eq!(tree.value(node, source).unwrap(), None);
        assert_eq!(
            tree.require_value(node, source),
            Err(TreeError::Fastener(FastenerError::MissingValue { name: "source" }))
        );
        assert_eq!(tree.value_or(node, source, 7).unwrap(), 7);
    }

    #[test]
    fn links_drive_keyed_children() {
        let mut tree = Tree::<Model>::new();
        let header = tree.registry_mut().register(
            "header",
            FastenerMetadataBuilder::<Option<NodeId>>::empty()
                .kind(FastenerKind::Link)
                .build(),
        );
        let plain = tree
            .registry_mut()
            .register("plain", FastenerMetadataBuilder::new(None::<NodeId>).build());
        let class = Rc::new(
            FastenerClass::builder("Page")
                .field("header", header)
                .field("plain", plain)
                .build(),
        );
        let page = tree.create_node_with(class);
        let first = tree.create_node();
        let second = tree.create_node();

        assert_eq!(tree.set_link(page, header, Some(first)).unwrap(), None);
        assert_eq!(tree.child(page, "header"), Some(first));
        assert_eq!(tree.set_link(page, header, Some(second)).unwrap(), Some(first));
        assert_eq!(tree.link(page, header).unwrap(), Some(second));
        assert_eq!(tree.children(page), &[second]);
        assert!(matches!(
            tree.set_link(page, plain, Some(first)),
            Err(TreeError::Fastener(FastenerError::TypeMismatch { .. }))
        ));
    }
}
