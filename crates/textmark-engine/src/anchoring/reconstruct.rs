use std::cmp::Ordering;

use log::debug;

use super::codec::{Bias, Decoded, decode};
use super::selector::PathSelector;
use super::{Anchor, AnchorError};
use crate::profile::DocumentProfile;
use crate::tree::{DocumentTree, char_len, index_in_parent, index_path, is_text};

/// A live position: a char offset inside a text node, or a child index
/// inside an element or the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> Boundary<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Ephemeral range resolved against the current tree. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange<N> {
    pub start: Boundary<N>,
    pub end: Boundary<N>,
}

impl<N> LiveRange<N> {
    pub fn new(start: Boundary<N>, end: Boundary<N>) -> Self {
        Self { start, end }
    }
}

/// Resolve both anchors of `selector` into a [`LiveRange`].
///
/// The ends are decoded independently; a reversed selector is not rejected here.
pub fn resolve<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    selector: &PathSelector,
) -> Result<LiveRange<T::Node>, AnchorError> {
    let start = resolve_anchor(tree, profile, &selector.start, Bias::Start)?;
    let end = resolve_anchor(tree, profile, &selector.end, Bias::End)?;
    debug!("resolved {selector} to {start:?}..{end:?}");
    Ok(LiveRange { start, end })
}

/// Decode one anchor into a live boundary.
pub fn resolve_anchor<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    anchor: &Anchor,
    bias: Bias,
) -> Result<Boundary<T::Node>, AnchorError> {
    let sibling_boundary = |node: T::Node, shift: usize| {
        match (tree.parent(node), index_in_parent(tree, node)) {
            (Some(parent), Some(index)) => Ok(Boundary::new(parent, index + shift)),
            _ => Err(AnchorError::drift(anchor.path(), "node has no parent")),
        }
    };

    match decode(tree, profile, anchor, bias)? {
        Decoded::Before(node) => sibling_boundary(node, 0),
        Decoded::After(node) => sibling_boundary(node, 1),
        Decoded::Char { text, offset } => Ok(Boundary::new(text, offset)),
    }
}

/// Document-order comparison of two boundaries in the same tree.
pub fn compare_boundaries<T: DocumentTree>(
    tree: &T,
    a: Boundary<T::Node>,
    b: Boundary<T::Node>,
) -> Ordering {
    order_key(tree, a).cmp(&order_key(tree, b))
}

/// Child `i` sorts as `2i + 1`, the gap before it as `2i`, so element
/// boundaries interleave with the subtrees they separate.
fn order_key<T: DocumentTree>(tree: &T, boundary: Boundary<T::Node>) -> Vec<usize> {
    let mut key: Vec<usize> = index_path(tree, boundary.node)
        .into_iter()
        .map(|index| 2 * index + 1)
        .collect();
    if is_text(tree, boundary.node) {
        key.push(boundary.offset);
    } else {
        key.push(2 * boundary.offset);
    }
    key
}

/// Number of characters inside `container` that precede `boundary`.
///
/// Returns `None` when the boundary does not lie within `container`.
pub fn text_offset_within<T: DocumentTree>(
    tree: &T,
    container: T::Node,
    boundary: Boundary<T::Node>,
) -> Option<usize> {
    let mut total = if is_text(tree, boundary.node) {
        boundary.offset
    } else {
        tree.children(boundary.node)
            .iter()
            .take(boundary.offset)
            .map(|&child| char_len(tree, child))
            .sum()
    };

    let mut current = boundary.node;
    while current != container {
        let parent = tree.parent(current)?;
        total += tree
            .children(parent)
            .iter()
            .take_while(|&&sibling| sibling != current)
            .map(|&sibling| char_len(tree, sibling))
            .sum::<usize>();
        current = parent;
    }
    Some(total)
}
