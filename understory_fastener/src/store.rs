// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node sparse slot storage.
//!
//! A [`FastenerStore`] holds the slots a node has actually touched. Slots are
//! created on first access, kept sorted by [`FastenerId`] in a `SmallVec` and
//! found by binary search; most nodes touch only a handful of fields.
//!
//! The store only records state. Binding, fan-out and precedence checks live
//! in [`FastenerHostExt`](crate::FastenerHostExt) because they span several
//! stores.

use smallvec::SmallVec;

use crate::id::FastenerId;
use crate::precedence::Precedence;
use crate::value::ErasedValue;

/// Inline capacity for slots per node.
const INLINE_SLOTS: usize = 4;

/// Inline capacity for the dependents of one slot.
const INLINE_SUBS: usize = 2;

bitflags::bitflags! {
    /// Status bits of a slot.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SlotState: u8 {
        /// The value mirrors the super slot.
        const INHERITED  = 0b0000_0001;
        /// The value was written explicitly and must not be replaced by the super.
        const OVERRIDDEN = 0b0000_0010;
        /// The owner is mounted; the slot is (or may be) bound.
        const MOUNTED    = 0b0000_0100;
    }
}

/// Address of a slot: the owning node and the fastener.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef<K> {
    /// The node owning the slot.
    pub owner: K,
    /// The fastener the slot instantiates.
    pub id: FastenerId,
}

impl<K> SlotRef<K> {
    /// Creates a slot address.
    pub const fn new(owner: K, id: FastenerId) -> Self {
        Self { owner, id }
    }
}

/// One instantiated fastener on one node.
#[derive(Clone, Debug)]
pub struct FastenerSlot<K> {
    id: FastenerId,
    field: &'static str,
    pub(crate) value: Option<ErasedValue>,
    pub(crate) precedence: Precedence,
    pub(crate) state: SlotState,
    pub(crate) super_ref: Option<SlotRef<K>>,
    pub(crate) subs: SmallVec<[SlotRef<K>; INLINE_SUBS]>,
}

impl<K: Copy + Eq> FastenerSlot<K> {
    fn new(id: FastenerId, field: &'static str, precedence: Precedence) -> Self {
        Self {
            id,
            field,
            value: None,
            precedence,
            state: SlotState::empty(),
            super_ref: None,
            subs: SmallVec::new(),
        }
    }

    /// Returns the fastener id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> FastenerId {
        self.id
    }

    /// Returns the field name the slot was declared under.
    #[must_use]
    #[inline]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Returns the stored value, own or inherited.
    #[must_use]
    #[inline]
    pub fn erased_value(&self) -> Option<&ErasedValue> {
        self.value.as_ref()
    }

    /// Returns the stored value as a `T`.
    #[must_use]
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.as_ref().and_then(ErasedValue::downcast_ref)
    }

    /// Returns the current precedence.
    #[must_use]
    #[inline]
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Returns the status bits.
    #[must_use]
    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Returns `true` while the value mirrors the super slot.
    #[must_use]
    #[inline]
    pub fn is_inherited(&self) -> bool {
        self.state.contains(SlotState::INHERITED)
    }

    /// Returns `true` once the slot has been written explicitly.
    #[must_use]
    #[inline]
    pub fn is_overridden(&self) -> bool {
        self.state.contains(SlotState::OVERRIDDEN)
    }

    /// Returns the super slot, if bound.
    #[must_use]
    #[inline]
    pub fn super_ref(&self) -> Option<SlotRef<K>> {
        self.super_ref
    }

    /// Returns the slots currently bound to this one.
    #[must_use]
    #[inline]
    pub fn subs(&self) -> &[SlotRef<K>] {
        &self.subs
    }

    pub(crate) fn add_sub(&mut self, sub: SlotRef<K>) {
        if !self.subs.contains(&sub) {
            self.subs.push(sub);
        }
    }

    pub(crate) fn remove_sub(&mut self, sub: SlotRef<K>) {
        self.subs.retain(|s| *s != sub);
    }
}

/// Sparse slot storage for one node.
///
/// ```rust
/// use understory_fastener::{FastenerId, FastenerStore, Precedence};
///
/// let mut store = FastenerStore::new(1_u32);
/// let id = FastenerId::new(3);
/// assert!(store.slot(id).is_none());
///
/// store.instantiate(id, "font", Precedence::INTRINSIC);
/// assert_eq!(store.slot(id).unwrap().field(), "font");
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct FastenerStore<K> {
    slots: SmallVec<[FastenerSlot<K>; INLINE_SLOTS]>,
    owner: K,
    mounted: bool,
}

impl<K: Copy + Eq> FastenerStore<K> {
    /// Creates an empty store for `owner`.
    #[must_use]
    pub fn new(owner: K) -> Self {
        Self {
            slots: SmallVec::new(),
            owner,
            mounted: false,
        }
    }

    /// Returns the owner key.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> K {
        self.owner
    }

    /// Returns `true` between mount and unmount of the owner.
    #[must_use]
    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub(crate) fn set_mounted(&mut self, mounted: bool) {
        self.mounted = mounted;
    }

    /// Returns the number of instantiated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot has been instantiated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    fn find(&self, id: FastenerId) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&id, FastenerSlot::id)
    }

    /// Returns the slot for `id`, if instantiated.
    #[must_use]
    pub fn slot(&self, id: FastenerId) -> Option<&FastenerSlot<K>> {
        self.find(id).ok().map(|idx| &self.slots[idx])
    }

    pub(crate) fn slot_mut(&mut self, id: FastenerId) -> Option<&mut FastenerSlot<K>> {
        self.find(id).ok().map(|idx| &mut self.slots[idx])
    }

    /// Instantiates the slot for `id` if it does not exist yet.
    ///
    /// Returns `true` if a slot was created.
    pub fn instantiate(&mut self, id: FastenerId, field: &'static str, precedence: Precedence) -> bool {
        match self.find(id) {
            Ok(_) => false,
            Err(idx) => {
                self.slots.insert(idx, FastenerSlot::new(id, field, precedence));
                true
            }
        }
    }

    /// Iterates instantiated slots in id order.
    pub fn slots(&self) -> impl Iterator<Item = &FastenerSlot<K>> {
        self.slots.iter()
    }

    /// Returns the ids of instantiated slots in id order.
    pub fn ids(&self) -> impl Iterator<Item = FastenerId> + '_ {
        self.slots.iter().map(FastenerSlot::id)
    }
}
