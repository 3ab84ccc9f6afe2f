// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Write precedence.

use core::fmt;

/// Rank that arbitrates between an inherited value and an explicit write.
///
/// Higher wins. A write is accepted when its precedence is at least the
/// slot's current precedence, and a slot inherits from its super only while
/// the super's precedence is at least its own.
///
/// ```rust
/// use understory_fastener::Precedence;
///
/// assert!(Precedence::EXTRINSIC > Precedence::INTRINSIC);
/// assert_eq!(Precedence::default(), Precedence::INTRINSIC);
/// assert!(Precedence::new(5) > Precedence::EXTRINSIC);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Precedence(i32);

impl Precedence {
    /// Precedence of values a slot starts with or mirrors from its super.
    pub const INTRINSIC: Self = Self(0);
    /// Default precedence of explicit writes.
    pub const EXTRINSIC: Self = Self(1);

    /// Creates a precedence from a raw rank.
    #[must_use]
    #[inline]
    pub const fn new(rank: i32) -> Self {
        Self(rank)
    }

    /// Returns the raw rank.
    #[must_use]
    #[inline]
    pub const fn rank(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INTRINSIC => f.write_str("Intrinsic"),
            Self::EXTRINSIC => f.write_str("Extrinsic"),
            Self(rank) => f.debug_tuple("Precedence").field(&rank).finish(),
        }
    }
}
