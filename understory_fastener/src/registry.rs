// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fastener registry.
//!
//! [`FastenerRegistry`] owns the metadata of every fastener and hands out the
//! typed [`Fastener<T>`] handles used everywhere else.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use hashbrown::HashMap;

use crate::id::{Fastener, FastenerId};
use crate::metadata::{FastenerKind, FastenerMetadata, Inherit};
use crate::precedence::Precedence;
use crate::value::ErasedValue;

/// A registration entry.
pub struct FastenerRegistration {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    metadata: Box<dyn ErasedMetadata>,
}

impl FastenerRegistration {
    /// Returns the registered name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`TypeId`] of the value type.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the slot kind.
    #[must_use]
    pub fn kind(&self) -> FastenerKind {
        self.metadata.kind()
    }

    /// Returns the inheritance mode.
    #[must_use]
    pub fn inherit(&self) -> Inherit {
        self.metadata.inherit()
    }

    /// Returns the precedence fresh slots start with.
    #[must_use]
    pub fn initial_precedence(&self) -> Precedence {
        self.metadata.initial_precedence()
    }

    /// Returns the update bits required on change.
    #[must_use]
    pub fn update_bits(&self) -> u32 {
        self.metadata.update_bits()
    }

    /// Returns the default value, erased.
    #[must_use]
    pub fn default_value(&self) -> Option<ErasedValue> {
        self.metadata.default_erased()
    }
}

impl core::fmt::Debug for FastenerRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FastenerRegistration")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("kind", &self.kind())
            .field("inherit", &self.inherit())
            .finish_non_exhaustive()
    }
}

/// A registry of fasteners.
///
/// Fasteners are registered once, before node classes reference them.
///
/// ```rust
/// use understory_fastener::{FastenerMetadataBuilder, FastenerRegistry, Inherit};
///
/// let mut registry = FastenerRegistry::new();
/// let font = registry.register(
///     "font",
///     FastenerMetadataBuilder::new(12.0_f64).inherits(true).build(),
/// );
///
/// assert_eq!(registry.name(font.id()), Some("font"));
/// assert_eq!(registry.inherit(font.id()), Inherit::SameName);
/// assert_eq!(registry.by_name("font"), Some(font.id()));
/// ```
#[derive(Default)]
pub struct FastenerRegistry {
    fasteners: Vec<FastenerRegistration>,
    by_name: HashMap<&'static str, FastenerId>,
}

impl FastenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fastener and returns its typed handle.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered, or if more than 65,535
    /// fasteners are registered.
    pub fn register<T: Clone + 'static>(
        &mut self,
        name: &'static str,
        metadata: FastenerMetadata<T>,
    ) -> Fastener<T> {
        assert!(
            !self.by_name.contains_key(name),
            "Fastener '{name}' is already registered"
        );
        assert!(
            self.fasteners.len() < u16::MAX as usize,
            "Too many fasteners registered (max {})",
            u16::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = FastenerId::new(self.fasteners.len() as u16);

        self.fasteners.push(FastenerRegistration {
            name,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            metadata: Box::new(metadata),
        });
        self.by_name.insert(name, id);

        Fastener::from_id(id)
    }

    /// Returns the number of registered fasteners.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.fasteners.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fasteners.is_empty()
    }

    /// Looks up a fastener by registered name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<FastenerId> {
        self.by_name.get(name).copied()
    }

    /// Returns the registration for an id.
    #[must_use]
    pub fn get(&self, id: FastenerId) -> Option<&FastenerRegistration> {
        self.fasteners.get(id.index() as usize)
    }

    /// Returns the registered name.
    #[must_use]
    pub fn name(&self, id: FastenerId) -> Option<&'static str> {
        self.get(id).map(FastenerRegistration::name)
    }

    /// Returns the value [`TypeId`].
    #[must_use]
    pub fn type_id(&self, id: FastenerId) -> Option<TypeId> {
        self.get(id).map(FastenerRegistration::type_id)
    }

    /// Returns the inheritance mode; unknown ids never inherit.
    #[must_use]
    pub fn inherit(&self, id: FastenerId) -> Inherit {
        self.get(id).map_or(Inherit::None, FastenerRegistration::inherit)
    }

    /// Returns the starting precedence; unknown ids report `INTRINSIC`.
    #[must_use]
    pub fn initial_precedence(&self, id: FastenerId) -> Precedence {
        self.get(id)
            .map_or(Precedence::INTRINSIC, FastenerRegistration::initial_precedence)
    }

    /// Returns the update bits required on change.
    #[must_use]
    pub fn update_bits(&self, id: FastenerId) -> u32 {
        self.get(id).map_or(0, FastenerRegistration::update_bits)
    }

    /// Returns the erased default value.
    #[must_use]
    pub fn default_value(&self, id: FastenerId) -> Option<ErasedValue> {
        self.get(id).and_then(FastenerRegistration::default_value)
    }

    /// Returns typed metadata, or `None` on unknown id or type mismatch.
    #[must_use]
    pub fn get_metadata<T: 'static>(&self, fastener: Fastener<T>) -> Option<&FastenerMetadata<T>> {
        self.get(fastener.id())
            .and_then(|r| r.metadata.as_any().downcast_ref())
    }

    /// Iterates all registrations in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FastenerId, &FastenerRegistration)> {
        self.fasteners.iter().enumerate().map(|(i, r)| {
            #[expect(clippy::cast_possible_truncation, reason = "index < len < u16::MAX")]
            (FastenerId::new(i as u16), r)
        })
    }
}

impl core::fmt::Debug for FastenerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FastenerRegistry")
            .field("count", &self.fasteners.len())
            .field(
                "fasteners",
                &self.fasteners.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Object-safe view over `FastenerMetadata<T>`.
trait ErasedMetadata: Any {
    fn as_any(&self) -> &dyn Any;
    fn kind(&self) -> FastenerKind;
    fn inherit(&self) -> Inherit;
    fn initial_precedence(&self) -> Precedence;
    fn update_bits(&self) -> u32;
    fn default_erased(&self) -> Option<ErasedValue>;
}

impl<T: 'static> ErasedMetadata for FastenerMetadata<T>
where
    T: Clone,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> FastenerKind {
        Self::kind(self)
    }

    fn inherit(&self) -> Inherit {
        Self::inherit(self)
    }

    fn initial_precedence(&self) -> Precedence {
        Self::initial_precedence(self)
    }

    fn update_bits(&self) -> u32 {
        Self::update_bits(self)
    }

    fn default_erased(&self) -> Option<ErasedValue> {
        self.default_value().cloned().map(ErasedValue::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FastenerMetadataBuilder;
    use alloc::{format, vec};

    #[test]
    fn register_assigns_dense_ids() {
        let mut registry = FastenerRegistry::new();
        let a = registry.register("a", FastenerMetadataBuilder::new(0_u8).build());
        let b = registry.register("b", FastenerMetadataBuilder::new(0_u8).build());
        assert_eq!(a.id().index(), 0);
        assert_eq!(b.id().index(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookups() {
        let mut registry = FastenerRegistry::new();
        let font = registry.register(
            "font",
            FastenerMetadataBuilder::new(12.0_f64)
                .inherits("typeface")
                .initial_precedence(Precedence::new(-1))
                .requires_update(4)
                .build(),
        );

        assert_eq!(registry.type_id(font.id()), Some(TypeId::of::<f64>()));
        assert_eq!(registry.inherit(font.id()), Inherit::Named("typeface"));
        assert_eq!(registry.initial_precedence(font.id()), Precedence::new(-1));
        assert_eq!(registry.update_bits(font.id()), 4);
        let default = registry.default_value(font.id()).unwrap();
        assert_eq!(default.downcast_ref::<f64>(), Some(&12.0));
        assert_eq!(registry.get_metadata(font).unwrap().default_value(), Some(&12.0));
    }

    #[test]
    fn unknown_ids_are_inert() {
        let registry = FastenerRegistry::new();
        let id = FastenerId::new(9);
        assert_eq!(registry.name(id), None);
        assert_eq!(registry.inherit(id), Inherit::None);
        assert!(registry.default_value(id).is_none());
    }

    #[test]
    fn iter_in_order() {
        let mut registry = FastenerRegistry::new();
        registry.register("x", FastenerMetadataBuilder::new(0_i32).build());
        registry.register("y", FastenerMetadataBuilder::new(0_i32).build());
        let names: Vec<_> = registry.iter().map(|(_, r)| r.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert!(format!("{registry:?}").contains("\"y\""));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_names_panic() {
        let mut registry = FastenerRegistry::new();
        registry.register("x", FastenerMetadataBuilder::new(0_i32).build());
        registry.register("x", FastenerMetadataBuilder::new(0_i32).build());
    }
}
