// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fastener inheritance through mounted trees.

use std::cell::RefCell;
use std::rc::Rc;

use understory_lifecycle::understory_fastener::{
    Fastener, FastenerClass, FastenerMetadataBuilder, Precedence, WriteOutcome,
};
use understory_lifecycle::{Environment, Facet, HookResult, Model, NodeFlags, NodeId, Phase, Tree};

struct Fixture {
    tree: Tree<Model>,
    color: Fastener<u32>,
    a: NodeId,
    b: NodeId,
}

/// `a` declares an inheriting `color`; `b` is its child of the same class.
fn fixture() -> Fixture {
    let mut tree = Tree::<Model>::new();
    let color = tree.registry_mut().register(
        "color",
        FastenerMetadataBuilder::new(0_u32).inherits(true).build(),
    );
    let class = Rc::new(FastenerClass::builder("Swatch").field("color", color).build());
    let a = tree.create_node_with(class.clone());
    let b = tree.create_node_with(class);
    tree.append_child(a, b, None).unwrap();
    tree.cascade_mount(a).unwrap();
    Fixture { tree, color, a, b }
}

/// Reads `color` whenever its node mutates.
struct ReadOnMutate {
    color: Fastener<u32>,
    seen: Rc<RefCell<Vec<u32>>>,
}

impl Facet<Model> for ReadOnMutate {
    fn on_phase(&mut self, tree: &mut Tree<Model>, node: NodeId, phase: Phase, _: &Environment) -> HookResult {
        if phase == Phase::Mutate {
            self.seen.borrow_mut().push(tree.require_value(node, self.color)?);
        }
        Ok(())
    }
}

#[test]
fn extrinsic_write_reaches_inheriting_child() {
    let Fixture {
        mut tree,
        color,
        a,
        b,
    } = fixture();
    let seen = Rc::new(RefCell::new(Vec::new()));
    tree.attach_facet(
        b,
        ReadOnMutate {
            color,
            seen: seen.clone(),
        },
    )
    .unwrap();
    assert!(tree.is_inherited(b, color));

    let outcome = tree.set_value(a, color, 7).unwrap();
    assert_eq!(outcome.affected(), &[a, b]);
    assert!(tree.flags(b).unwrap().contains(NodeFlags::NEEDS_MUTATE));

    tree.flush_updates();
    assert_eq!(*seen.borrow(), [7]);
    assert_eq!(tree.value(b, color).unwrap(), Some(7));
    assert!(tree.is_inherited(b, color));
}

#[test]
fn dominating_write_uninherits_child() {
    let Fixture {
        mut tree,
        color,
        a,
        b,
    } = fixture();
    tree.set_value(a, color, 1).unwrap();

    tree.set_value(b, color, 2).unwrap();
    assert!(!tree.is_inherited(b, color));
    assert_eq!(tree.value(a, color).unwrap(), Some(1));

    let outcome = tree.set_value_with(a, color, 3, Precedence::INTRINSIC).unwrap();
    assert_eq!(
        outcome,
        WriteOutcome::Rejected {
            current: Precedence::EXTRINSIC
        }
    );
    tree.set_value(a, color, 4).unwrap();
    assert_eq!(tree.value(a, color).unwrap(), Some(4));
    assert_eq!(tree.value(b, color).unwrap(), Some(2));
    tree.flush_updates();
    assert_eq!(tree.value(b, color).unwrap(), Some(2));
}

#[test]
fn reset_reinherits_and_decoheres() {
    let Fixture {
        mut tree,
        color,
        a,
        b,
    } = fixture();
    tree.set_value(a, color, 5).unwrap();
    tree.set_value(b, color, 9).unwrap();
    tree.flush_updates();

    tree.reset_value(b, color).unwrap();
    assert!(tree.is_inherited(b, color));
    assert_eq!(tree.value(b, color).unwrap(), Some(5));
    assert!(tree.flags(b).unwrap().contains(NodeFlags::NEEDS_MUTATE));
    assert!(!tree.flags(a).unwrap().contains(NodeFlags::NEEDS_MUTATE));
}

#[test]
fn raised_precedence_stops_inheritance() {
    let Fixture {
        mut tree,
        color,
        a,
        b,
    } = fixture();
    tree.set_precedence(b, color, Precedence::new(5)).unwrap();
    assert!(!tree.is_inherited(b, color));
    assert_eq!(tree.precedence(b, color), Some(Precedence::new(5)));

    tree.set_value(a, color, 8).unwrap();
    assert_ne!(tree.value(b, color).unwrap(), Some(8));

    tree.set_precedence(b, color, Precedence::INTRINSIC).unwrap();
    assert!(tree.is_inherited(b, color));
    assert_eq!(tree.value(b, color).unwrap(), Some(8));
}

#[test]
fn moving_a_subtree_rebinds() {
    let Fixture {
        mut tree,
        color,
        a,
        b,
    } = fixture();
    let class = tree.class(a).unwrap().clone();
    let other = tree.create_node_with(class);
    tree.cascade_mount(other).unwrap();
    tree.set_value(a, color, 1).unwrap();
    tree.set_value(other, color, 2).unwrap();
    assert_eq!(tree.value(b, color).unwrap(), Some(1));

    tree.append_child(other, b, None).unwrap();
    assert_eq!(tree.value(b, color).unwrap(), Some(2));
    tree.set_value(a, color, 3).unwrap();
    assert_eq!(tree.value(b, color).unwrap(), Some(2));

    tree.remove(b).unwrap();
    assert!(!tree.is_inherited(b, color));
    assert_eq!(tree.value(b, color).unwrap(), Some(0));
}
