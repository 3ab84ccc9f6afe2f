// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding, precedence and fan-out across stores.
//!
//! A tree implements [`FastenerHost`] to expose its stores, its parent links
//! and its per-node field tables. [`FastenerHostExt`] is implemented for every
//! host and carries the algorithms:
//!
//! - **Bind** (on mount): an inheriting slot finds the nearest ancestor
//!   declaring the target field with the same value type, instantiates the
//!   slot there if needed, and links itself as a dependent.
//! - **Write**: a write below the slot's precedence is rejected. Otherwise the
//!   value is stored and pushed eagerly to every dependent it dominates.
//! - **Read**: an instantiated slot answers from its value, or from its super
//!   while inherited. A slot never touched pulls through the ancestors without
//!   being created. A slot that neither holds nor inherits a value, bound or
//!   not, falls back to the host's ambient value, then to the registered
//!   default.
//! - **Unbind** (on unmount): dependents are orphaned and inherited values
//!   are dropped.

use alloc::vec::Vec;
use core::any::TypeId;
use core::fmt::Debug;

use crate::error::FastenerError;
use crate::id::{Fastener, FastenerId};
use crate::precedence::Precedence;
use crate::registry::FastenerRegistry;
use crate::store::{FastenerSlot, FastenerStore, SlotRef, SlotState};
use crate::value::ErasedValue;

/// Access a tree gives to the fastener algorithms.
pub trait FastenerHost<K: Copy + Eq + Debug> {
    /// Returns the registry the handles come from.
    fn registry(&self) -> &FastenerRegistry;

    /// Returns the parent of `key`, if any.
    fn parent_key(&self, key: K) -> Option<K>;

    /// Looks up a field in the class of `key`.
    fn field_id(&self, key: K, field: &str) -> Option<FastenerId>;

    /// Returns the field name `key` declares `id` under.
    fn field_name(&self, key: K, id: FastenerId) -> Option<&'static str>;

    /// Returns the store of `key`.
    fn store(&self, key: K) -> Option<&FastenerStore<K>>;

    /// Returns the store of `key` mutably.
    fn store_mut(&mut self, key: K) -> Option<&mut FastenerStore<K>>;

    /// Returns a host-wide value used by unbound slots before the default.
    fn ambient(&self, id: FastenerId) -> Option<&ErasedValue> {
        let _ = id;
        None
    }
}

/// Result of a fastener write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome<K> {
    /// The value was stored.
    Applied {
        /// Owners whose value changed, the writer first.
        affected: Vec<K>,
    },
    /// The write was below the slot's precedence.
    Rejected {
        /// The precedence that rejected the write.
        current: Precedence,
    },
}

impl<K> WriteOutcome<K> {
    /// Returns `true` if the write was stored.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Returns the affected owners; empty when rejected.
    #[must_use]
    pub fn affected(&self) -> &[K] {
        match self {
            Self::Applied { affected } => affected,
            Self::Rejected { .. } => &[],
        }
    }
}

/// Fastener algorithms, implemented for every [`FastenerHost`].
pub trait FastenerHostExt<K: Copy + Eq + Debug>: FastenerHost<K> {
    /// Returns the instantiated slot, if any.
    fn fastener_slot(&self, key: K, id: FastenerId) -> Option<&FastenerSlot<K>> {
        self.store(key).and_then(|store| store.slot(id))
    }

    /// Instantiates the slot for `id` on `key`, binding it if `key` is mounted.
    fn ensure_slot(&mut self, key: K, id: FastenerId) -> Result<(), FastenerError> {
        let store = self.store(key).ok_or(FastenerError::UnknownOwner)?;
        if store.slot(id).is_some() {
            return Ok(());
        }
        let registry = self.registry();
        let name = registry.name(id).ok_or(FastenerError::Unregistered { id })?;
        let precedence = registry.initial_precedence(id);
        let field = self
            .field_name(key, id)
            .ok_or(FastenerError::NotDeclared { name })?;

        let store = self.store_mut(key).ok_or(FastenerError::UnknownOwner)?;
        store.instantiate(id, field, precedence);
        if store.is_mounted() {
            if let Some(slot) = store.slot_mut(id) {
                slot.state |= SlotState::MOUNTED;
            }
            self.bind_slot(key, id)?;
        }
        Ok(())
    }

    /// Finds the nearest strict ancestor declaring `field` with type `type_id`.
    fn find_super(&self, key: K, field: &str, type_id: Option<TypeId>) -> Option<SlotRef<K>> {
        let mut cursor = self.parent_key(key);
        while let Some(ancestor) = cursor {
            if let Some(id) = self.field_id(ancestor, field)
                && self.registry().type_id(id) == type_id
            {
                return Some(SlotRef::new(ancestor, id));
            }
            cursor = self.parent_key(ancestor);
        }
        None
    }

    /// Links an inheriting slot to its super and adopts the super's value.
    fn bind_slot(&mut self, key: K, id: FastenerId) -> Result<(), FastenerError> {
        let Some(slot) = self.fastener_slot(key, id) else {
            return Ok(());
        };
        if slot.super_ref().is_some() {
            return Ok(());
        }
        let Some(target) = self.registry().inherit(id).resolve(slot.field()) else {
            return Ok(());
        };
        let Some(super_ref) = self.find_super(key, target, self.registry().type_id(id)) else {
            return Ok(());
        };
        self.ensure_slot(super_ref.owner, super_ref.id)?;

        let this = SlotRef::new(key, id);
        if let Some(slot) = self
            .store_mut(super_ref.owner)
            .and_then(|store| store.slot_mut(super_ref.id))
        {
            slot.add_sub(this);
        }
        if let Some(slot) = self.store_mut(key).and_then(|store| store.slot_mut(id)) {
            slot.super_ref = Some(super_ref);
        }
        tracing::trace!(?key, %id, owner = ?super_ref.owner, "bound fastener");
        self.adopt(key, id);
        Ok(())
    }

    /// Re-evaluates whether a bound slot mirrors its super.
    ///
    /// Returns the previous value when the slot took the super's value.
    fn adopt(&mut self, key: K, id: FastenerId) -> Option<Option<ErasedValue>> {
        let slot = self.fastener_slot(key, id)?;
        let super_ref = slot.super_ref()?;
        if slot.is_overridden() {
            return None;
        }
        let precedence = slot.precedence();
        let (value, dominates) = match self.fastener_slot(super_ref.owner, super_ref.id) {
            Some(sup) => (sup.erased_value().cloned(), sup.precedence() >= precedence),
            None => (None, false),
        };
        let slot = self.store_mut(key)?.slot_mut(id)?;
        if dominates {
            slot.state |= SlotState::INHERITED;
            Some(core::mem::replace(&mut slot.value, value))
        } else {
            slot.state -= SlotState::INHERITED;
            None
        }
    }

    /// Detaches a slot from its super and orphans its dependents.
    fn unbind_slot(&mut self, key: K, id: FastenerId) {
        let this = SlotRef::new(key, id);
        let Some(slot) = self.store_mut(key).and_then(|store| store.slot_mut(id)) else {
            return;
        };
        let super_ref = slot.super_ref.take();
        if slot.is_inherited() {
            slot.value = None;
            slot.state -= SlotState::INHERITED;
        }
        let subs = core::mem::take(&mut slot.subs);

        if let Some(super_ref) = super_ref
            && let Some(sup) = self
                .store_mut(super_ref.owner)
                .and_then(|store| store.slot_mut(super_ref.id))
        {
            sup.remove_sub(this);
        }
        for sub in subs {
            if let Some(slot) = self
                .store_mut(sub.owner)
                .and_then(|store| store.slot_mut(sub.id))
            {
                slot.super_ref = None;
                if slot.is_inherited() {
                    slot.value = None;
                    slot.state -= SlotState::INHERITED;
                }
            }
        }
    }

    /// Marks the store of `key` mounted and binds every slot.
    ///
    /// Callers mount parents before children so supers are bound first.
    fn mount_fasteners(&mut self, key: K) -> Result<(), FastenerError> {
        let store = self.store_mut(key).ok_or(FastenerError::UnknownOwner)?;
        store.set_mounted(true);
        let ids: Vec<_> = store.ids().collect();
        for id in ids {
            if let Some(slot) = self.store_mut(key).and_then(|store| store.slot_mut(id)) {
                slot.state |= SlotState::MOUNTED;
            }
            self.bind_slot(key, id)?;
        }
        Ok(())
    }

    /// Unbinds every slot of `key` and marks the store unmounted.
    fn unmount_fasteners(&mut self, key: K) {
        let Some(store) = self.store(key) else {
            return;
        };
        let ids: Vec<_> = store.ids().collect();
        for id in ids {
            self.unbind_slot(key, id);
            if let Some(slot) = self.store_mut(key).and_then(|store| store.slot_mut(id)) {
                slot.state -= SlotState::MOUNTED;
            }
        }
        if let Some(store) = self.store_mut(key) {
            store.set_mounted(false);
        }
    }

    /// Pushes the value of `from` to every dependent it dominates.
    ///
    /// Records each replaced slot with its previous value.
    fn fan_out(&mut self, from: SlotRef<K>, changed: &mut Vec<(SlotRef<K>, Option<ErasedValue>)>) {
        let Some(slot) = self.fastener_slot(from.owner, from.id) else {
            return;
        };
        let subs = slot.subs().to_vec();
        let value = slot.erased_value().cloned();
        let precedence = slot.precedence();
        for sub in subs {
            let Some(slot) = self
                .store_mut(sub.owner)
                .and_then(|store| store.slot_mut(sub.id))
            else {
                continue;
            };
            if slot.is_overridden() {
                continue;
            }
            if precedence >= slot.precedence {
                let old = core::mem::replace(&mut slot.value, value.clone());
                slot.state |= SlotState::INHERITED;
                changed.push((sub, old));
                self.fan_out(sub, changed);
            } else {
                slot.state -= SlotState::INHERITED;
            }
        }
    }

    /// Checks that `id` is registered with value type `T`.
    fn check_type<T: 'static>(&self, id: FastenerId) -> Result<&'static str, FastenerError> {
        let registration = self
            .registry()
            .get(id)
            .ok_or(FastenerError::Unregistered { id })?;
        if registration.type_id() == TypeId::of::<T>() {
            Ok(registration.name())
        } else {
            Err(FastenerError::TypeMismatch {
                name: registration.name(),
            })
        }
    }

    /// Writes `value` into the slot of `key` at `precedence`.
    ///
    /// The value is coerced, stored, and pushed to dependents. Changed
    /// callbacks run once per changed slot after all stores are updated.
    fn write_fastener<T: Clone + 'static>(
        &mut self,
        key: K,
        fastener: Fastener<T>,
        value: T,
        precedence: Precedence,
    ) -> Result<WriteOutcome<K>, FastenerError> {
        let id = fastener.id();
        self.check_type::<T>(id)?;
        self.ensure_slot(key, id)?;

        let current = self
            .fastener_slot(key, id)
            .map_or(Precedence::INTRINSIC, FastenerSlot::precedence);
        if precedence < current {
            tracing::debug!(?key, %id, ?precedence, ?current, "fastener write rejected");
            return Ok(WriteOutcome::Rejected { current });
        }

        let value = match self.registry().get_metadata(fastener) {
            Some(metadata) => metadata.coerce(value),
            None => value,
        };
        let slot = self
            .store_mut(key)
            .and_then(|store| store.slot_mut(id))
            .ok_or(FastenerError::UnknownOwner)?;
        let old = slot.value.replace(ErasedValue::new(value));
        slot.precedence = precedence;
        slot.state -= SlotState::INHERITED;
        slot.state |= SlotState::OVERRIDDEN;

        let this = SlotRef::new(key, id);
        let mut changed = Vec::new();
        changed.push((this, old));
        self.fan_out(this, &mut changed);
        Ok(WriteOutcome::Applied {
            affected: self.notify_changed::<T>(&changed),
        })
    }

    /// Runs changed callbacks and returns the distinct owners.
    fn notify_changed<T: Clone + 'static>(
        &self,
        changed: &[(SlotRef<K>, Option<ErasedValue>)],
    ) -> Vec<K> {
        let mut owners: Vec<K> = Vec::with_capacity(changed.len());
        for (slot_ref, old) in changed {
            if !owners.contains(&slot_ref.owner) {
                owners.push(slot_ref.owner);
            }
            let Some(metadata) = self
                .registry()
                .get_metadata(Fastener::<T>::from_id(slot_ref.id))
            else {
                continue;
            };
            let new = self
                .fastener_slot(slot_ref.owner, slot_ref.id)
                .and_then(|slot| slot.value::<T>());
            if let Some(new) = new {
                metadata.on_changed(old.as_ref().and_then(ErasedValue::downcast_ref), new);
            }
        }
        owners
    }

    /// Resolves the value of `id` on `key` without instantiating anything.
    fn resolve_erased(&self, key: K, id: FastenerId) -> Option<ErasedValue> {
        let registry = self.registry();
        match self.fastener_slot(key, id) {
            Some(slot) => {
                if let Some(value) = slot.erased_value() {
                    return Some(value.clone());
                }
                if let Some(super_ref) = slot.super_ref()
                    && slot.is_inherited()
                {
                    return self.resolve_erased(super_ref.owner, super_ref.id);
                }
            }
            None => {
                if let Some(field) = self.field_name(key, id)
                    && let Some(target) = registry.inherit(id).resolve(field)
                    && let Some(super_ref) = self.find_super(key, target, registry.type_id(id))
                {
                    let super_precedence = self
                        .fastener_slot(super_ref.owner, super_ref.id)
                        .map_or_else(
                            || registry.initial_precedence(super_ref.id),
                            FastenerSlot::precedence,
                        );
                    if super_precedence >= registry.initial_precedence(id) {
                        return self.resolve_erased(super_ref.owner, super_ref.id);
                    }
                }
            }
        }
        self.ambient(id)
            .cloned()
            .or_else(|| registry.default_value(id))
    }

    /// Reads the value of a fastener on `key`.
    ///
    /// Returns `Ok(None)` when nothing in the chain supplies a value.
    fn read_fastener<T: Clone + 'static>(
        &self,
        key: K,
        fastener: Fastener<T>,
    ) -> Result<Option<T>, FastenerError> {
        self.check_type::<T>(fastener.id())?;
        Ok(self
            .resolve_erased(key, fastener.id())
            .and_then(|value| value.downcast_ref::<T>().cloned()))
    }

    /// Reads a fastener that must resolve to a value.
    fn require_fastener<T: Clone + 'static>(
        &self,
        key: K,
        fastener: Fastener<T>,
    ) -> Result<T, FastenerError> {
        let name = self.check_type::<T>(fastener.id())?;
        self.read_fastener(key, fastener)?
            .ok_or(FastenerError::MissingValue { name })
    }

    /// Changes the precedence of a slot and re-evaluates inheritance.
    ///
    /// Returns the owners whose value changed.
    fn set_fastener_precedence(
        &mut self,
        key: K,
        id: FastenerId,
        precedence: Precedence,
    ) -> Result<Vec<K>, FastenerError> {
        self.ensure_slot(key, id)?;
        if let Some(slot) = self.store_mut(key).and_then(|store| store.slot_mut(id)) {
            slot.precedence = precedence;
        }
        let this = SlotRef::new(key, id);
        let mut changed = Vec::new();
        if let Some(old) = self.adopt(key, id) {
            changed.push((this, old));
        }
        self.fan_out(this, &mut changed);
        Ok(distinct_owners(&changed))
    }

    /// Drops an explicit value and returns the slot to its initial state.
    ///
    /// A bound slot re-inherits from its super. Returns the owners whose
    /// value changed.
    fn reset_fastener(&mut self, key: K, id: FastenerId) -> Result<Vec<K>, FastenerError> {
        if self.fastener_slot(key, id).is_none() {
            return Ok(Vec::new());
        }
        let initial = self.registry().initial_precedence(id);
        let slot = self
            .store_mut(key)
            .and_then(|store| store.slot_mut(id))
            .ok_or(FastenerError::UnknownOwner)?;
        let old = slot.value.take();
        slot.precedence = initial;
        slot.state -= SlotState::OVERRIDDEN | SlotState::INHERITED;

        let this = SlotRef::new(key, id);
        let mut changed = Vec::new();
        changed.push((this, old));
        self.adopt(key, id);
        self.fan_out(this, &mut changed);
        Ok(distinct_owners(&changed))
    }
}

impl<K: Copy + Eq + Debug, H: FastenerHost<K> + ?Sized> FastenerHostExt<K> for H {}

fn distinct_owners<K: Copy + Eq>(changed: &[(SlotRef<K>, Option<ErasedValue>)]) -> Vec<K> {
    let mut owners: Vec<K> = Vec::with_capacity(changed.len());
    for (slot_ref, _) in changed {
        if !owners.contains(&slot_ref.owner) {
            owners.push(slot_ref.owner);
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::FastenerClass;
    use crate::metadata::FastenerMetadataBuilder;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;
    use hashbrown::HashMap;

    /// A chain of nodes `0 <- 1 <- 2 ...` sharing one class.
    struct Chain {
        registry: FastenerRegistry,
        class: FastenerClass,
        stores: Vec<FastenerStore<usize>>,
        ambient: HashMap<FastenerId, ErasedValue>,
    }

    impl Chain {
        fn new(registry: FastenerRegistry, class: FastenerClass, len: usize) -> Self {
            Self {
                registry,
                class,
                stores: (0..len).map(FastenerStore::new).collect(),
                ambient: HashMap::new(),
            }
        }

        fn mount_all(&mut self) {
            for key in 0..self.stores.len() {
                self.mount_fasteners(key).unwrap();
            }
        }
    }

    impl FastenerHost<usize> for Chain {
        fn registry(&self) -> &FastenerRegistry {
            &self.registry
        }

        fn parent_key(&self, key: usize) -> Option<usize> {
            key.checked_sub(1)
        }

        fn field_id(&self, _: usize, field: &str) -> Option<FastenerId> {
            self.class.field(field)
        }

        fn field_name(&self, _: usize, id: FastenerId) -> Option<&'static str> {
            self.class.field_name(id)
        }

        fn store(&self, key: usize) -> Option<&FastenerStore<usize>> {
            self.stores.get(key)
        }

        fn store_mut(&mut self, key: usize) -> Option<&mut FastenerStore<usize>> {
            self.stores.get_mut(key)
        }

        fn ambient(&self, id: FastenerId) -> Option<&ErasedValue> {
            self.ambient.get(&id)
        }
    }

    fn font_chain(len: usize) -> (Chain, Fastener<f64>) {
        let mut registry = FastenerRegistry::new();
        let font = registry.register(
            "font",
            FastenerMetadataBuilder::new(12.0_f64).inherits(true).build(),
        );
        let class = FastenerClass::builder("Node").field("font", font).build();
        (Chain::new(registry, class, len), font)
    }

    #[test]
    fn write_fans_out_to_bound_descendants() {
        let (mut chain, font) = font_chain(3);
        chain.mount_all();
        chain.ensure_slot(2, font.id()).unwrap();

        let outcome = chain
            .write_fastener(0, font, 16.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(outcome.affected(), &[0, 1, 2]);
        assert_eq!(chain.read_fastener(2, font).unwrap(), Some(16.0));
        // Intermediate slot was instantiated while binding.
        assert!(chain.fastener_slot(1, font.id()).is_some());
        assert!(chain.fastener_slot(2, font.id()).unwrap().is_inherited());
    }

    #[test]
    fn untouched_slots_pull_through_ancestors() {
        let (mut chain, font) = font_chain(4);
        chain.mount_all();
        chain
            .write_fastener(1, font, 20.0, Precedence::INTRINSIC)
            .unwrap();

        assert_eq!(chain.read_fastener(3, font).unwrap(), Some(20.0));
        assert!(chain.fastener_slot(3, font.id()).is_none());
        assert_eq!(chain.read_fastener(0, font).unwrap(), Some(12.0));
    }

    #[test]
    fn lower_precedence_write_is_rejected() {
        let (mut chain, font) = font_chain(1);
        chain
            .write_fastener(0, font, 10.0, Precedence::EXTRINSIC)
            .unwrap();
        let outcome = chain
            .write_fastener(0, font, 11.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Rejected {
                current: Precedence::EXTRINSIC
            }
        );
        assert_eq!(chain.read_fastener(0, font).unwrap(), Some(10.0));
    }

    #[test]
    fn overridden_descendant_is_not_replaced() {
        let (mut chain, font) = font_chain(3);
        chain.mount_all();
        chain
            .write_fastener(1, font, 9.0, Precedence::INTRINSIC)
            .unwrap();
        chain.ensure_slot(2, font.id()).unwrap();
        let outcome = chain
            .write_fastener(0, font, 30.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(outcome.affected(), &[0]);
        assert_eq!(chain.read_fastener(2, font).unwrap(), Some(9.0));
    }

    #[test]
    fn unmount_drops_inherited_values() {
        let (mut chain, font) = font_chain(2);
        chain.mount_all();
        chain
            .write_fastener(0, font, 14.0, Precedence::INTRINSIC)
            .unwrap();
        chain.ensure_slot(1, font.id()).unwrap();
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(14.0));

        chain.unmount_fasteners(1);
        let slot = chain.fastener_slot(1, font.id()).unwrap();
        assert!(slot.super_ref().is_none());
        assert!(!slot.is_inherited());
        assert!(chain.fastener_slot(0, font.id()).unwrap().subs().is_empty());
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(12.0));
    }

    #[test]
    fn ambient_applies_to_unbound_slots() {
        let (mut chain, font) = font_chain(2);
        chain.ambient.insert(font.id(), ErasedValue::new(18.0_f64));
        assert_eq!(chain.read_fastener(0, font).unwrap(), Some(18.0));
        // Unbound and untouched child pulls from the root, which is ambient.
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(18.0));
    }

    #[test]
    fn uninherited_empty_slot_falls_back_to_ambient() {
        let (mut chain, font) = font_chain(2);
        chain.mount_all();
        chain.ensure_slot(1, font.id()).unwrap();
        chain
            .set_fastener_precedence(1, font.id(), Precedence::EXTRINSIC)
            .unwrap();
        let slot = chain.fastener_slot(1, font.id()).unwrap();
        assert!(slot.super_ref().is_some());
        assert!(!slot.is_inherited());
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(12.0));

        chain.ambient.insert(font.id(), ErasedValue::new(18.0_f64));
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(18.0));
    }

    #[test]
    fn raising_child_precedence_stops_inheritance() {
        let (mut chain, font) = font_chain(2);
        chain.mount_all();
        chain.ensure_slot(1, font.id()).unwrap();
        chain
            .write_fastener(0, font, 15.0, Precedence::INTRINSIC)
            .unwrap();
        assert!(chain.fastener_slot(1, font.id()).unwrap().is_inherited());

        chain
            .set_fastener_precedence(1, font.id(), Precedence::EXTRINSIC)
            .unwrap();
        assert!(!chain.fastener_slot(1, font.id()).unwrap().is_inherited());

        chain
            .write_fastener(0, font, 22.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(15.0));

        let affected = chain
            .set_fastener_precedence(1, font.id(), Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(affected, vec![1]);
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(22.0));
    }

    #[test]
    fn reset_reinherits() {
        let (mut chain, font) = font_chain(2);
        chain.mount_all();
        chain
            .write_fastener(0, font, 15.0, Precedence::INTRINSIC)
            .unwrap();
        chain
            .write_fastener(1, font, 8.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(8.0));

        chain.reset_fastener(1, font.id()).unwrap();
        assert_eq!(chain.read_fastener(1, font).unwrap(), Some(15.0));
        assert!(chain.fastener_slot(1, font.id()).unwrap().is_inherited());
    }

    #[test]
    fn type_mismatch_is_reported() {
        let (mut chain, font) = font_chain(1);
        let wrong: Fastener<u8> = Fastener::from_id(font.id());
        assert_eq!(
            chain.write_fastener(0, wrong, 1, Precedence::INTRINSIC),
            Err(FastenerError::TypeMismatch { name: "font" })
        );
    }

    #[test]
    fn undeclared_field_is_reported() {
        let (mut chain, _) = font_chain(1);
        let other = chain
            .registry
            .register("other", FastenerMetadataBuilder::new(0_u8).build());
        assert_eq!(
            chain.write_fastener(0, other, 1, Precedence::INTRINSIC),
            Err(FastenerError::NotDeclared { name: "other" })
        );
    }

    #[test]
    fn missing_value_without_default() {
        let mut registry = FastenerRegistry::new();
        let theme = registry.register(
            "theme",
            FastenerMetadataBuilder::<u32>::empty().inherits(true).build(),
        );
        let class = FastenerClass::builder("Node").field("theme", theme).build();
        let chain = Chain::new(registry, class, 2);
        assert_eq!(
            chain.require_fastener(1, theme),
            Err(FastenerError::MissingValue { name: "theme" })
        );
    }

    #[test]
    fn changed_callbacks_see_old_and_new() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut registry = FastenerRegistry::new();
        let font = registry.register(
            "font",
            FastenerMetadataBuilder::new(12.0_f64)
                .inherits(true)
                .on_changed(move |old, new| sink.borrow_mut().push((old.copied(), *new)))
                .build(),
        );
        let class = FastenerClass::builder("Node").field("font", font).build();
        let mut chain = Chain::new(registry, class, 2);
        chain.mount_all();
        chain.ensure_slot(1, font.id()).unwrap();

        chain
            .write_fastener(0, font, 13.0, Precedence::INTRINSIC)
            .unwrap();
        assert_eq!(*log.borrow(), vec![(None, 13.0), (None, 13.0)]);
    }
}
