// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased slot values.

use alloc::rc::Rc;
use core::any::{Any, TypeId};
use core::fmt;

/// A type-erased fastener value.
///
/// Values are shared behind an [`Rc`], so pushing an inherited value down a
/// subtree clones a pointer rather than the payload. Every slot that mirrors
/// the same authoritative value observes the same allocation.
///
/// ```rust
/// use understory_fastener::ErasedValue;
///
/// let value = ErasedValue::new(16.0_f64);
/// assert!(value.is::<f64>());
/// assert_eq!(value.downcast_ref::<f64>(), Some(&16.0));
/// assert!(value.ptr_eq(&value.clone()));
/// ```
#[derive(Clone)]
pub struct ErasedValue {
    inner: Rc<dyn Any>,
    type_id: TypeId,
}

impl ErasedValue {
    /// Erases a concrete value.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            inner: Rc::new(value),
        }
    }

    /// Returns the [`TypeId`] of the erased value.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns `true` if the erased value is a `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrows the value as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns `true` if both values share one allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}
