// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fastener identification types.
//!
//! [`FastenerId`] is the runtime key a [`FastenerRegistry`](crate::FastenerRegistry)
//! hands out; [`Fastener<T>`] carries the value type alongside it so reads and
//! writes are checked at compile time.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// A runtime fastener identifier.
///
/// Ids are dense indices into the registry, so they double as sort keys for
/// the per-node [`FastenerStore`](crate::FastenerStore).
///
/// ```rust
/// use understory_fastener::FastenerId;
///
/// let id = FastenerId::new(7);
/// assert_eq!(id.index(), 7);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FastenerId(u16);

impl FastenerId {
    /// Creates a fastener id from a registry index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the registry index of this id.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for FastenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FastenerId").field(&self.0).finish()
    }
}

impl fmt::Display for FastenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed handle to a registered fastener.
///
/// Obtained from [`FastenerRegistry::register`](crate::FastenerRegistry::register).
/// The phantom `T` is the slot's value type; a `Fastener<f64>` can only be
/// read and written with `f64` values.
pub struct Fastener<T> {
    id: FastenerId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Fastener<T> {
    /// Wraps a raw id.
    ///
    /// The id must have been registered with value type `T`; reads through a
    /// mismatched handle report [`FastenerError::TypeMismatch`](crate::FastenerError::TypeMismatch).
    #[must_use]
    #[inline]
    pub const fn from_id(id: FastenerId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped id.
    #[must_use]
    #[inline]
    pub const fn id(self) -> FastenerId {
        self.id
    }
}

impl<T> Copy for Fastener<T> {}

impl<T> Clone for Fastener<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Fastener<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Fastener<T> {}

impl<T> Hash for Fastener<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Fastener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fastener")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}
