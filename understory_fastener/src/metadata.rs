// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fastener metadata definitions.
//!
//! [`FastenerMetadata`] describes how a slot behaves: its kind, default,
//! inheritance, starting precedence, the update bits its owner needs when the
//! value changes, and optional callbacks. [`FastenerMetadataBuilder`] builds it.

use alloc::boxed::Box;

use crate::precedence::Precedence;

/// Callback invoked after a slot's value changes.
///
/// Receives the previous value (if any) and the new one.
pub type FastenerChangedCallback<T> = Box<dyn Fn(Option<&T>, &T)>;

/// Callback that coerces a written value before it is stored.
pub type CoerceValueCallback<T> = Box<dyn Fn(T) -> T>;

/// What a fastener stands for on its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum FastenerKind {
    /// A plain stateful value.
    #[default]
    Property,
    /// A shared collaborator (manager, provider) looked up by name.
    Service,
    /// A keyed child reference, `Option<K>` valued.
    Link,
}

/// Where a slot looks for its super slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Inherit {
    /// The slot never inherits.
    #[default]
    None,
    /// Inherit from the nearest ancestor field with the same field name.
    SameName,
    /// Inherit from the nearest ancestor field with this name.
    Named(&'static str),
}

impl Inherit {
    /// Resolves the ancestor field name for a slot declared as `field`.
    #[must_use]
    pub fn resolve(self, field: &'static str) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::SameName => Some(field),
            Self::Named(name) => Some(name),
        }
    }

    /// Returns `true` unless this is [`Inherit::None`].
    #[must_use]
    pub fn inherits(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl From<bool> for Inherit {
    fn from(inherits: bool) -> Self {
        if inherits { Self::SameName } else { Self::None }
    }
}

impl From<&'static str> for Inherit {
    fn from(name: &'static str) -> Self {
        Self::Named(name)
    }
}

/// Metadata for a fastener.
///
/// ```rust
/// use understory_fastener::{FastenerKind, FastenerMetadataBuilder, Inherit, Precedence};
///
/// let metadata = FastenerMetadataBuilder::new(12.0_f64)
///     .inherits(true)
///     .requires_update(0b10)
///     .build();
///
/// assert_eq!(metadata.default_value(), Some(&12.0));
/// assert_eq!(metadata.inherit(), Inherit::SameName);
/// assert_eq!(metadata.kind(), FastenerKind::Property);
/// assert_eq!(metadata.initial_precedence(), Precedence::INTRINSIC);
/// assert_eq!(metadata.update_bits(), 0b10);
/// ```
pub struct FastenerMetadata<T: 'static> {
    kind: FastenerKind,
    default_value: Option<T>,
    inherit: Inherit,
    initial_precedence: Precedence,
    update_bits: u32,
    changed_callback: Option<FastenerChangedCallback<T>>,
    coerce_callback: Option<CoerceValueCallback<T>>,
}

impl<T: 'static> FastenerMetadata<T> {
    /// Returns the slot kind.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> FastenerKind {
        self.kind
    }

    /// Returns the default value, if the slot has one.
    #[must_use]
    #[inline]
    pub fn default_value(&self) -> Option<&T> {
        self.default_value.as_ref()
    }

    /// Returns the inheritance mode.
    #[must_use]
    #[inline]
    pub fn inherit(&self) -> Inherit {
        self.inherit
    }

    /// Returns the precedence fresh slots start with.
    #[must_use]
    #[inline]
    pub fn initial_precedence(&self) -> Precedence {
        self.initial_precedence
    }

    /// Returns the update bits the owner requires when the value changes.
    ///
    /// The bits are opaque here; the tree interprets them as its own flags.
    #[must_use]
    #[inline]
    pub fn update_bits(&self) -> u32 {
        self.update_bits
    }

    /// Invokes the changed callback, if any.
    #[inline]
    pub fn on_changed(&self, old_value: Option<&T>, new_value: &T) {
        if let Some(callback) = &self.changed_callback {
            callback(old_value, new_value);
        }
    }

    /// Coerces a written value, if a coerce callback is set.
    #[inline]
    pub fn coerce(&self, value: T) -> T {
        match &self.coerce_callback {
            Some(callback) => callback(value),
            None => value,
        }
    }
}

impl<T: core::fmt::Debug + 'static> core::fmt::Debug for FastenerMetadata<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FastenerMetadata")
            .field("kind", &self.kind)
            .field("default_value", &self.default_value)
            .field("inherit", &self.inherit)
            .field("initial_precedence", &self.initial_precedence)
            .field("update_bits", &self.update_bits)
            .field("has_changed_callback", &self.changed_callback.is_some())
            .field("has_coerce_callback", &self.coerce_callback.is_some())
            .finish()
    }
}

/// Builder for [`FastenerMetadata`].
///
/// ```rust
/// use std::rc::Rc;
/// use understory_fastener::{FastenerKind, FastenerMetadataBuilder};
///
/// trait Clock {}
///
/// let metadata = FastenerMetadataBuilder::<Rc<dyn Clock>>::empty()
///     .kind(FastenerKind::Service)
///     .inherits(true)
///     .build();
/// assert!(metadata.default_value().is_none());
/// ```
pub struct FastenerMetadataBuilder<T: 'static> {
    metadata: FastenerMetadata<T>,
}

impl<T: core::fmt::Debug + 'static> core::fmt::Debug for FastenerMetadataBuilder<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("FastenerMetadataBuilder")
            .field(&self.metadata)
            .finish()
    }
}

impl<T: 'static> FastenerMetadataBuilder<T> {
    /// Starts a builder with a default value.
    #[must_use]
    pub fn new(default_value: T) -> Self {
        let mut builder = Self::empty();
        builder.metadata.default_value = Some(default_value);
        builder
    }

    /// Starts a builder without a default; unset reads yield nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            metadata: FastenerMetadata {
                kind: FastenerKind::Property,
                default_value: None,
                inherit: Inherit::None,
                initial_precedence: Precedence::INTRINSIC,
                update_bits: 0,
                changed_callback: None,
                coerce_callback: None,
            },
        }
    }

    /// Sets the slot kind.
    #[must_use]
    pub fn kind(mut self, kind: FastenerKind) -> Self {
        self.metadata.kind = kind;
        self
    }

    /// Sets the inheritance mode.
    ///
    /// Accepts `true`/`false` or an ancestor field name.
    #[must_use]
    pub fn inherits(mut self, inherit: impl Into<Inherit>) -> Self {
        self.metadata.inherit = inherit.into();
        self
    }

    /// Sets the precedence fresh slots start with.
    #[must_use]
    pub fn initial_precedence(mut self, precedence: Precedence) -> Self {
        self.metadata.initial_precedence = precedence;
        self
    }

    /// Sets the update bits required on the owner when the value changes.
    #[must_use]
    pub fn requires_update(mut self, bits: u32) -> Self {
        self.metadata.update_bits = bits;
        self
    }

    /// Sets a callback invoked after the value changes.
    #[must_use]
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&T>, &T) + 'static,
    {
        self.metadata.changed_callback = Some(Box::new(callback));
        self
    }

    /// Sets a callback that coerces written values.
    #[must_use]
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) -> T + 'static,
    {
        self.metadata.coerce_callback = Some(Box::new(callback));
        self
    }

    /// Builds the metadata.
    #[must_use]
    pub fn build(self) -> FastenerMetadata<T> {
        self.metadata
    }
}
