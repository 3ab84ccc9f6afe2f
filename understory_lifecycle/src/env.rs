// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistent cascade context.
//!
//! An [`Environment`] is handed down every pass. Facets extend it at their
//! node with [`Environment::with`], which returns a new environment sharing
//! the parent's frames; the parent's view is never changed.

use alloc::rc::Rc;
use core::fmt;

use understory_fastener::ErasedValue;

struct Frame {
    key: &'static str,
    value: ErasedValue,
    next: Option<Rc<Frame>>,
}

/// Immutable, shared context for a cascade.
///
/// ```rust
/// use understory_lifecycle::Environment;
///
/// let root = Environment::new().with("theme", "dark");
/// let inner = root.with("scale", 2.0_f64);
///
/// assert_eq!(inner.get::<&str>("theme"), Some(&"dark"));
/// assert_eq!(inner.get::<f64>("scale"), Some(&2.0));
/// assert_eq!(root.get::<f64>("scale"), None);
/// ```
#[derive(Clone, Default)]
pub struct Environment {
    head: Option<Rc<Frame>>,
}

impl Environment {
    /// An empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new environment with `key` bound to `value`.
    ///
    /// The new binding shadows any outer binding of the same key.
    #[must_use]
    pub fn with<T: 'static>(&self, key: &'static str, value: T) -> Self {
        Self {
            head: Some(Rc::new(Frame {
                key,
                value: ErasedValue::new(value),
                next: self.head.clone(),
            })),
        }
    }

    /// Looks up the innermost binding of `key` as a `T`.
    ///
    /// A binding of another type shadows outer bindings and yields `None`.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.frames()
            .find(|frame| frame.key == key)
            .and_then(|frame| frame.value.downcast_ref())
    }

    /// Returns `true` if `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.frames().any(|frame| frame.key == key)
    }

    /// Returns the number of bindings, shadowed ones included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    /// Returns `true` if both environments share the same innermost frame.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        core::iter::successors(self.head.as_deref(), |frame| frame.next.as_deref())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames().map(|frame| frame.key))
            .finish()
    }
}
