// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type field tables.
//!
//! A [`FastenerClass`] maps the field names a node type declares to the
//! fasteners backing them. Tables are built once per type with
//! [`FastenerClassBuilder`]; [`extends`](FastenerClassBuilder::extends) copies
//! the supertype's fields into the new table, so lookups never walk a chain.

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::id::{Fastener, FastenerId};

/// A flattened field table for one node type.
///
/// ```rust
/// use understory_fastener::{FastenerClass, FastenerMetadataBuilder, FastenerRegistry};
///
/// let mut registry = FastenerRegistry::new();
/// let font = registry.register("font", FastenerMetadataBuilder::new(12.0_f64).build());
/// let color = registry.register("color", FastenerMetadataBuilder::new(0_u32).build());
///
/// let base = FastenerClass::builder("Base").field("font", font).build();
/// let label = FastenerClass::builder("Label")
///     .extends(&base)
///     .field("color", color)
///     .build();
///
/// assert_eq!(label.field("font"), Some(font.id()));
/// assert_eq!(label.field("color"), Some(color.id()));
/// assert_eq!(label.field_name(color.id()), Some("color"));
/// assert_eq!(base.field("color"), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct FastenerClass {
    name: &'static str,
    fields: Vec<(&'static str, FastenerId)>,
    by_name: HashMap<&'static str, FastenerId>,
}

impl FastenerClass {
    /// A class with no fields.
    #[must_use]
    pub fn empty(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Starts building a class.
    #[must_use]
    pub fn builder(name: &'static str) -> FastenerClassBuilder {
        FastenerClassBuilder {
            class: Self::empty(name),
        }
    }

    /// Returns the type name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Looks up the fastener behind a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FastenerId> {
        self.by_name.get(name).copied()
    }

    /// Returns the first field declared with `id`.
    #[must_use]
    pub fn field_name(&self, id: FastenerId) -> Option<&'static str> {
        self.fields
            .iter()
            .find_map(|&(name, field)| (field == id).then_some(name))
    }

    /// Iterates fields in declaration order, supertype fields first.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FastenerId)> + '_ {
        self.fields.iter().copied()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the class declares no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`FastenerClass`].
#[derive(Debug)]
pub struct FastenerClassBuilder {
    class: FastenerClass,
}

impl FastenerClassBuilder {
    /// Copies every field of `parent` into this class.
    ///
    /// Fields declared afterwards with the same name replace the inherited
    /// declaration in place.
    #[must_use]
    pub fn extends(mut self, parent: &FastenerClass) -> Self {
        for (name, id) in parent.fields() {
            self.declare(name, id);
        }
        self
    }

    /// Declares a field.
    #[must_use]
    pub fn field<T>(mut self, name: &'static str, fastener: Fastener<T>) -> Self {
        self.declare(name, fastener.id());
        self
    }

    /// Builds the class.
    #[must_use]
    pub fn build(self) -> FastenerClass {
        self.class
    }

    fn declare(&mut self, name: &'static str, id: FastenerId) {
        let class = &mut self.class;
        if class.by_name.insert(name, id).is_some() {
            if let Some(entry) = class.fields.iter_mut().find(|(field, _)| *field == name) {
                entry.1 = id;
            }
        } else {
            class.fields.push((name, id));
        }
    }
}
