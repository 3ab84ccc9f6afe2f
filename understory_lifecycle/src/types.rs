// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the lifecycle tree: node identifiers, flags, passes and flavors.

use core::fmt;

/// Identifier for a node in a [`Tree`](crate::Tree).
///
/// A small, copyable handle made of a slot index and a generation counter.
///
/// - On creation, a fresh slot is allocated with generation `1`.
/// - On [`destroy`](crate::Tree::destroy), the slot is freed and every
///   `NodeId` that pointed to it becomes stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new,
///   distinct `NodeId`.
///
/// Stale ids never alias a different live node because the generation must
/// match. Operations given a stale id fail with
/// [`TreeError::StaleNode`](crate::TreeError::StaleNode).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0, self.1)
    }
}

bitflags::bitflags! {
    /// Lifecycle status and pending-update bits of a node.
    ///
    /// The low byte holds status bits. Bits 8..16 belong to the first pass
    /// (analyze / process) and bits 16..24 to the second pass (refresh /
    /// display). Model and View name the same bits differently; both sets of
    /// names are defined here.
    ///
    /// Status bits are never accepted by
    /// [`require_update`](crate::Tree::require_update).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        /// The node is mounted.
        const MOUNTED     = 1 << 0;
        /// The node is powered.
        const POWERED     = 1 << 1;
        /// The node is mounted and has at least one consumer.
        const CONSUMING   = 1 << 2;
        /// A cascade is iterating the node's children.
        const TRAVERSING  = 1 << 3;
        /// The analyze pass is running on the node.
        const ANALYZING   = 1 << 4;
        /// The process pass is running on the node.
        const PROCESSING  = 1 << 4;
        /// The refresh pass is running on the node.
        const REFRESHING  = 1 << 5;
        /// The display pass is running on the node.
        const DISPLAYING  = 1 << 5;
        /// Removal was requested while a cascade was active.
        const REMOVING    = 1 << 6;
        /// An immediate update was requested and not yet flushed.
        const IMMEDIATE   = 1 << 7;

        /// The analyze pass is pending.
        const NEEDS_ANALYZE   = 1 << 8;
        /// Model: the mutate sub-phase is pending.
        const NEEDS_MUTATE    = 1 << 9;
        /// Model: the aggregate sub-phase is pending.
        const NEEDS_AGGREGATE = 1 << 10;
        /// Model: the correlate sub-phase is pending.
        const NEEDS_CORRELATE = 1 << 11;

        /// The process pass is pending.
        const NEEDS_PROCESS   = 1 << 8;
        /// View: the resize sub-phase is pending.
        const NEEDS_RESIZE    = 1 << 9;
        /// View: the scroll sub-phase is pending.
        const NEEDS_SCROLL    = 1 << 10;
        /// View: the change sub-phase is pending.
        const NEEDS_CHANGE    = 1 << 11;
        /// View: the animate sub-phase is pending.
        const NEEDS_ANIMATE   = 1 << 12;
        /// View: the project sub-phase is pending.
        const NEEDS_PROJECT   = 1 << 13;

        /// The refresh pass is pending.
        const NEEDS_REFRESH   = 1 << 16;
        /// Model: the validate sub-phase is pending.
        const NEEDS_VALIDATE  = 1 << 17;
        /// Model: the reconcile sub-phase is pending.
        const NEEDS_RECONCILE = 1 << 18;

        /// The display pass is pending.
        const NEEDS_DISPLAY   = 1 << 16;
        /// View: the layout sub-phase is pending.
        const NEEDS_LAYOUT    = 1 << 17;
        /// View: the render sub-phase is pending.
        const NEEDS_RENDER    = 1 << 18;
        /// View: the rasterize sub-phase is pending.
        const NEEDS_RASTERIZE = 1 << 19;
        /// View: the composite sub-phase is pending.
        const NEEDS_COMPOSITE = 1 << 20;

        /// All status bits.
        const STATUS_MASK  = 0x0000_00FF;
        /// Bits owned by the first pass.
        const ANALYZE_MASK = 0x0000_FF00;
        /// Bits owned by the first pass (View name).
        const PROCESS_MASK = 0x0000_FF00;
        /// Bits owned by the second pass.
        const REFRESH_MASK = 0x00FF_0000;
        /// Bits owned by the second pass (View name).
        const DISPLAY_MASK = 0x00FF_0000;
        /// All update bits.
        const UPDATE_MASK  = 0x00FF_FF00;
    }
}

impl NodeFlags {
    /// Returns the update bits, dropping status bits.
    #[must_use]
    #[inline]
    pub fn update_bits(self) -> Self {
        self & Self::UPDATE_MASK
    }
}

/// A lifecycle transition reported to hooks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// The node is being mounted.
    Mount,
    /// The node is being unmounted.
    Unmount,
    /// The node is being powered.
    Power,
    /// The node is being unpowered.
    Unpower,
    /// The node gained its first consumer while mounted, or mounted with consumers.
    StartConsuming,
    /// The node lost its last consumer, or unmounted while consuming.
    StopConsuming,
}

/// One of the two dirty passes of a flavor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Model first pass.
    Analyze,
    /// Model second pass.
    Refresh,
    /// View first pass.
    Process,
    /// View second pass.
    Display,
}

/// A conditional sub-phase of a pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Model analyze: apply pending changes.
    Mutate,
    /// Model analyze: combine child results.
    Aggregate,
    /// Model analyze: relate the node to its peers.
    Correlate,
    /// Model refresh: check consistency.
    Validate,
    /// Model refresh: reconcile with external state.
    Reconcile,
    /// View process: react to a size change.
    Resize,
    /// View process: react to a scroll offset change.
    Scroll,
    /// View process: apply changed properties.
    Change,
    /// View process: advance animations.
    Animate,
    /// View process: project into the parent's space.
    Project,
    /// View display: lay out.
    Layout,
    /// View display: render.
    Render,
    /// View display: rasterize.
    Rasterize,
    /// View display: composite.
    Composite,
}

impl Phase {
    /// Returns the pending bit of this sub-phase.
    #[must_use]
    pub const fn flag(self) -> NodeFlags {
        match self {
            Self::Mutate => NodeFlags::NEEDS_MUTATE,
            Self::Aggregate => NodeFlags::NEEDS_AGGREGATE,
            Self::Correlate => NodeFlags::NEEDS_CORRELATE,
            Self::Validate => NodeFlags::NEEDS_VALIDATE,
            Self::Reconcile => NodeFlags::NEEDS_RECONCILE,
            Self::Resize => NodeFlags::NEEDS_RESIZE,
            Self::Scroll => NodeFlags::NEEDS_SCROLL,
            Self::Change => NodeFlags::NEEDS_CHANGE,
            Self::Animate => NodeFlags::NEEDS_ANIMATE,
            Self::Project => NodeFlags::NEEDS_PROJECT,
            Self::Layout => NodeFlags::NEEDS_LAYOUT,
            Self::Render => NodeFlags::NEEDS_RENDER,
            Self::Rasterize => NodeFlags::NEEDS_RASTERIZE,
            Self::Composite => NodeFlags::NEEDS_COMPOSITE,
        }
    }
}

/// Static description of one pass of a flavor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PassInfo {
    /// Which pass this is.
    pub pass: Pass,
    /// The top-level pending bit.
    pub needs: NodeFlags,
    /// The status bit set while the pass runs on a node.
    pub active: NodeFlags,
    /// All bits owned by the pass.
    pub mask: NodeFlags,
    /// Sub-phases in execution order.
    pub phases: &'static [Phase],
}

/// A tree flavor: the names and sub-phases of its two passes.
///
/// The engine is shared; [`Model`] and [`View`] only differ in their tables.
pub trait Flavor: fmt::Debug + 'static {
    /// Name used in diagnostics.
    const NAME: &'static str;
    /// The first pass (analyze / process).
    const FIRST: PassInfo;
    /// The second pass (refresh / display).
    const SECOND: PassInfo;
    /// Bits required on a node whose fastener values changed.
    const DECOHERENT: NodeFlags;
}

/// Model flavor: analyze (mutate, aggregate, correlate) then refresh
/// (validate, reconcile).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Model;

impl Flavor for Model {
    const NAME: &'static str = "model";
    const FIRST: PassInfo = PassInfo {
        pass: Pass::Analyze,
        needs: NodeFlags::NEEDS_ANALYZE,
        active: NodeFlags::ANALYZING,
        mask: NodeFlags::ANALYZE_MASK,
        phases: &[Phase::Mutate, Phase::Aggregate, Phase::Correlate],
    };
    const SECOND: PassInfo = PassInfo {
        pass: Pass::Refresh,
        needs: NodeFlags::NEEDS_REFRESH,
        active: NodeFlags::REFRESHING,
        mask: NodeFlags::REFRESH_MASK,
        phases: &[Phase::Validate, Phase::Reconcile],
    };
    const DECOHERENT: NodeFlags = NodeFlags::NEEDS_MUTATE;
}

/// View flavor: process (resize, scroll, change, animate, project) then
/// display (layout, render, rasterize, composite).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct View;

impl Flavor for View {
    const NAME: &'static str = "view";
    const FIRST: PassInfo = PassInfo {
        pass: Pass::Process,
        needs: NodeFlags::NEEDS_PROCESS,
        active: NodeFlags::PROCESSING,
        mask: NodeFlags::PROCESS_MASK,
        phases: &[
            Phase::Resize,
            Phase::Scroll,
            Phase::Change,
            Phase::Animate,
            Phase::Project,
        ],
    };
    const SECOND: PassInfo = PassInfo {
        pass: Pass::Display,
        needs: NodeFlags::NEEDS_DISPLAY,
        active: NodeFlags::DISPLAYING,
        mask: NodeFlags::DISPLAY_MASK,
        phases: &[
            Phase::Layout,
            Phase::Render,
            Phase::Rasterize,
            Phase::Composite,
        ],
    };
    const DECOHERENT: NodeFlags = NodeFlags::NEEDS_CHANGE;
}
