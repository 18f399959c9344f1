use log::debug;

use super::anchor::{Anchor, NodePath, PathSegment};
use super::logical::{
    element_ordinal, has_logical_next, has_logical_previous, logical_children, logical_parent,
    logical_self, preceding_chars,
};
use super::reconstruct::Boundary;
use super::AnchorError;
use crate::profile::{DocumentProfile, NamespaceClass};
use crate::tree::{DocumentTree, char_len, first_text_leaf, is_attached, is_element, is_text};

/// Which side wins when a char offset falls exactly between two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Prefer the later child, so a range start lands inside the text it selects
    Start,
    /// Prefer the earlier child, so a range end stays with the text before it
    End,
}

/// Result of decoding an anchor against the current tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<N> {
    Before(N),
    After(N),
    Char { text: N, offset: usize },
}

/// Encode a live boundary as an [`Anchor`].
///
/// Text positions inside an atomic subtree have no character meaning; they
/// snap to the enclosing element, before it for a start and after it for an end.
pub fn encode<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    boundary: Boundary<T::Node>,
    is_start: bool,
) -> Result<Anchor, AnchorError> {
    if !is_attached(tree, boundary.node) {
        return Err(AnchorError::DetachedBoundary);
    }

    let anchor = if is_text(tree, boundary.node) {
        encode_text(tree, profile, boundary.node, boundary.offset, is_start)?
    } else {
        encode_element(tree, profile, boundary.node, boundary.offset)?
    };
    debug!("encoded {boundary:?} as {anchor}");
    Ok(anchor)
}

fn encode_text<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    text: T::Node,
    offset: usize,
    is_start: bool,
) -> Result<Anchor, AnchorError> {
    let parent = logical_parent(tree, profile, text).ok_or(AnchorError::DetachedBoundary)?;
    let path = node_path(tree, profile, parent)?;
    let len = char_len(tree, text);
    let offset = offset.min(len);

    if profile.atomic_root_of(tree, parent).is_some() {
        return Ok(if is_start {
            Anchor::Node(path)
        } else {
            Anchor::AfterNode(path)
        });
    }

    let chars = preceding_chars(tree, profile, text) + offset;
    if offset == 0 && chars == 0 && !has_logical_previous(tree, profile, text) {
        Ok(Anchor::Node(path))
    } else if offset == len && !has_logical_next(tree, profile, text) {
        Ok(Anchor::AfterNode(path))
    } else {
        Ok(Anchor::Char(path, chars))
    }
}

fn encode_element<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    container: T::Node,
    index: usize,
) -> Result<Anchor, AnchorError> {
    let children = tree.children(container);
    if children.is_empty() {
        return Ok(Anchor::Node(node_path(tree, profile, container)?));
    }

    let is_addressable = |node: T::Node| is_element(tree, node) && !profile.is_marker(tree, node);

    if index >= children.len() {
        let last = children[children.len() - 1];
        if is_addressable(last) {
            return Ok(Anchor::AfterNode(node_path(tree, profile, last)?));
        }
        if !profile.is_marker(tree, container) {
            return Ok(Anchor::AfterNode(node_path(tree, profile, container)?));
        }
        // End of a marker's content is a text-flow position in the logical container
        let logical = logical_self(tree, profile, container).ok_or(AnchorError::DetachedBoundary)?;
        let path = node_path(tree, profile, logical)?;
        if !has_logical_next(tree, profile, container) {
            return Ok(Anchor::AfterNode(path));
        }
        let chars = preceding_chars(tree, profile, container) + char_len(tree, container);
        return Ok(Anchor::Char(path, chars));
    }

    let target = children[index];
    if is_addressable(target) {
        return Ok(Anchor::Node(node_path(tree, profile, target)?));
    }

    let logical = logical_self(tree, profile, container).ok_or(AnchorError::DetachedBoundary)?;
    let path = node_path(tree, profile, logical)?;
    let chars = preceding_chars(tree, profile, target);
    if chars == 0 && !has_logical_previous(tree, profile, target) {
        Ok(Anchor::Node(path))
    } else {
        Ok(Anchor::Char(path, chars))
    }
}

/// Structural path of an element; markers and elided implicit wrappers yield no segment.
pub fn node_path<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    node: T::Node,
) -> Result<NodePath, AnchorError> {
    if !is_attached(tree, node) {
        return Err(AnchorError::DetachedBoundary);
    }

    let mut segments = Vec::new();
    let mut current = node;
    while current != tree.root() {
        if is_element(tree, current)
            && !profile.is_marker(tree, current)
            && !profile.is_elided_wrapper(tree, current)
        {
            let tag = tree.tag_name(current).unwrap_or_default();
            segments.push(PathSegment::new(tag, element_ordinal(tree, profile, current)));
        }
        match tree.parent(current) {
            Some(parent) => current = parent,
            None => return Err(AnchorError::DetachedBoundary),
        }
    }
    segments.reverse();
    Ok(NodePath(segments))
}

/// Decode an anchor against the current tree.
pub fn decode<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    anchor: &Anchor,
    bias: Bias,
) -> Result<Decoded<T::Node>, AnchorError> {
    let node = resolve_path(tree, profile, anchor.path())?;
    let decoded = match anchor {
        Anchor::Node(_) => Decoded::Before(node),
        Anchor::AfterNode(_) => Decoded::After(node),
        Anchor::Char(path, offset) => {
            let (text, local) = locate_char(tree, node, *offset, bias).ok_or_else(|| {
                AnchorError::drift(path, format!("offset {offset} is outside the text content"))
            })?;
            Decoded::Char {
                text,
                offset: local,
            }
        }
    };
    debug!("decoded {anchor} to {decoded:?}");
    Ok(decoded)
}

/// Follow a path top-down through logical children.
pub fn resolve_path<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    path: &NodePath,
) -> Result<T::Node, AnchorError> {
    let mut current = tree.root();
    let mut class = NamespaceClass::Content;

    for segment in path.segments() {
        class = profile.class_after_segment(class, &segment.tag);
        current = match find_child(tree, profile, current, segment, class) {
            Some(found) => found,
            None => implicit_wrapper_child(tree, profile, current)
                .and_then(|wrapper| find_child(tree, profile, wrapper, segment, class))
                .ok_or_else(|| AnchorError::AnchorResolution {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })?,
        };
    }
    Ok(current)
}

fn find_child<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    parent: T::Node,
    segment: &PathSegment,
    class: NamespaceClass,
) -> Option<T::Node> {
    logical_children(tree, profile, parent)
        .into_iter()
        .filter(|&child| {
            is_element(tree, child)
                && tree
                    .tag_name(child)
                    .is_some_and(|tag| tag.eq_ignore_ascii_case(&segment.tag))
                && profile.namespace_class(tree, child) == class
        })
        .nth(segment.ordinal.checked_sub(1)?)
}

fn implicit_wrapper_child<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    parent: T::Node,
) -> Option<T::Node> {
    let parent_tag = tree.tag_name(parent)?;
    let wrapper = profile.implicit_wrapper_under(parent_tag)?;
    logical_children(tree, profile, parent).into_iter().find(|&child| {
        tree.tag_name(child)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(wrapper))
    })
}

/// Descend from `node` to the text leaf holding char `n`.
fn locate_char<T: DocumentTree>(
    tree: &T,
    node: T::Node,
    n: usize,
    bias: Bias,
) -> Option<(T::Node, usize)> {
    if let Some(text) = tree.text(node) {
        return (n <= text.chars().count()).then_some((node, n));
    }

    let candidates: Vec<T::Node> = tree
        .children(node)
        .iter()
        .copied()
        .filter(|&child| first_text_leaf(tree, child).is_some())
        .collect();
    let mut acc = 0;
    for (i, &child) in candidates.iter().enumerate() {
        let len = char_len(tree, child);
        let hit = match bias {
            Bias::Start => acc + len > n,
            Bias::End => acc + len >= n,
        };
        if hit || i + 1 == candidates.len() {
            return locate_char(tree, child, n.checked_sub(acc)?, bias);
        }
        acc += len;
    }
    None
}
