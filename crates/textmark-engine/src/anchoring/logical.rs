//! Marker-transparent views of the tree.
//!
//! Overlay markers are invisible to paths and offsets: every function here
//! sees the tree as if each marker were replaced by its children.

use crate::profile::DocumentProfile;
use crate::tree::{DocumentTree, char_len, is_element};

/// Parent of `node` with marker ancestors skipped.
pub fn logical_parent<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Option<T::Node> {
    let mut parent = tree.parent(node)?;
    while profile.is_marker(tree, parent) {
        parent = tree.parent(parent)?;
    }
    Some(parent)
}

/// `node` itself unless it is a marker, in which case its first non-marker ancestor.
pub fn logical_self<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Option<T::Node> {
    if profile.is_marker(tree, node) {
        logical_parent(tree, profile, node)
    } else {
        Some(node)
    }
}

/// Children of `node` with marker wrappers flattened away, recursively.
pub fn logical_children<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Vec<T::Node> {
    let mut out = Vec::new();
    collect_logical(tree, profile, node, &mut out);
    out
}

fn collect_logical<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
    out: &mut Vec<T::Node>,
) {
    for &child in tree.children(node) {
        if profile.is_marker(tree, child) {
            collect_logical(tree, profile, child, out);
        } else {
            out.push(child);
        }
    }
}

/// Children as the structural adjuster sees them: markers flattened,
/// whitespace artefacts and ignored formula tags dropped.
pub fn real_children<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Vec<T::Node> {
    logical_children(tree, profile, node)
        .into_iter()
        .filter(|&child| {
            !profile.is_artifact(tree, child) && !profile.is_ignored_atomic(tree, child)
        })
        .collect()
}

pub fn real_previous_sibling<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Option<T::Node> {
    let parent = logical_parent(tree, profile, node)?;
    let siblings = real_children(tree, profile, parent);
    let index = siblings.iter().position(|&sibling| sibling == node)?;
    index.checked_sub(1).map(|prev| siblings[prev])
}

pub fn real_next_sibling<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Option<T::Node> {
    let parent = logical_parent(tree, profile, node)?;
    let siblings = real_children(tree, profile, parent);
    let index = siblings.iter().position(|&sibling| sibling == node)?;
    siblings.get(index + 1).copied()
}

/// 1-based ordinal of an element among same-tag, same-namespace logical siblings.
pub fn element_ordinal<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> usize {
    let Some(parent) = logical_parent(tree, profile, node) else {
        return 1;
    };
    let tag = tree.tag_name(node).unwrap_or_default();
    let class = profile.namespace_class(tree, node);
    let preceding = logical_children(tree, profile, parent)
        .into_iter()
        .take_while(|&sibling| sibling != node)
        .filter(|&sibling| {
            is_element(tree, sibling)
                && tree
                    .tag_name(sibling)
                    .is_some_and(|t| t.eq_ignore_ascii_case(tag))
                && profile.namespace_class(tree, sibling) == class
        })
        .count();
    preceding + 1
}

/// Characters before `node` inside its logical parent, counting preceding
/// siblings at every marker level.
pub fn preceding_chars<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> usize {
    let mut total = 0;
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        total += tree
            .children(parent)
            .iter()
            .take_while(|&&sibling| sibling != current)
            .map(|&sibling| char_len(tree, sibling))
            .sum::<usize>();
        if !profile.is_marker(tree, parent) {
            break;
        }
        current = parent;
    }
    total
}

/// True when any sibling precedes `node` at its own level or at any
/// enclosing marker level.
pub fn has_logical_previous<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> bool {
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        if tree.children(parent).first() != Some(&current) {
            return true;
        }
        if !profile.is_marker(tree, parent) {
            return false;
        }
        current = parent;
    }
    false
}

/// Mirror of [`has_logical_previous`] for following siblings.
pub fn has_logical_next<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> bool {
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        if tree.children(parent).last() != Some(&current) {
            return true;
        }
        if !profile.is_marker(tree, parent) {
            return false;
        }
        current = parent;
    }
    false
}
