//! Marker insertion and removal.
//!
//! [`insert`] walks the tree depth-first from the lowest common ancestor of
//! a [`LiveRange`], carrying a three-state cursor:
//!
//! ```text
//! Before ──(start node)──▶ Inside ──(end node)──▶ After (walk stops)
//! ```
//!
//! Text leaves passed while `Inside` are wrapped whole; the start and end
//! leaves are split first so only the selected part is wrapped. Atomic
//! subtrees are never split: they are wrapped as one unit or not at all.

use std::fmt;

use log::{debug, warn};

use super::reconstruct::{Boundary, LiveRange, text_offset_within};
use crate::profile::DocumentProfile;
use crate::tree::{
    DocumentTree, char_len, contains, index_in_parent, is_text, lowest_common_ancestor,
};

/// Creates empty marker elements for [`insert`].
pub trait MarkerFactory<T: DocumentTree> {
    fn create_marker(&mut self, tree: &mut T) -> T::Node;
}

impl<T, F> MarkerFactory<T> for F
where
    T: DocumentTree,
    F: FnMut(&mut T) -> T::Node,
{
    fn create_marker(&mut self, tree: &mut T) -> T::Node {
        self(tree)
    }
}

/// Stamps markers with the profile's marker tag and a `data-annotation` id.
#[derive(Debug, Clone)]
pub struct AnnotationMarkerFactory {
    tag: String,
    annotation: String,
}

impl AnnotationMarkerFactory {
    pub const ATTRIBUTE: &'static str = "data-annotation";

    pub fn new(profile: &DocumentProfile, annotation: impl Into<String>) -> Self {
        Self {
            tag: profile.marker_tag.clone(),
            annotation: annotation.into(),
        }
    }
}

impl<T: DocumentTree> MarkerFactory<T> for AnnotationMarkerFactory {
    fn create_marker(&mut self, tree: &mut T) -> T::Node {
        let marker = tree.create_element(&self.tag);
        tree.set_attribute(marker, Self::ATTRIBUTE, &self.annotation);
        marker
    }
}

/// Non-fatal: a range boundary fell inside an atomic subtree, which was wrapped whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialAtomicSubtreeWarning {
    pub root_tag: String,
}

impl fmt::Display for PartialAtomicSubtreeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range boundary lies inside <{}>; the whole subtree was wrapped",
            self.root_tag
        )
    }
}

/// Markers created by one [`insert`], in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayInsertion<N> {
    pub markers: Vec<N>,
    pub warnings: Vec<PartialAtomicSubtreeWarning>,
}

impl<N> Default for OverlayInsertion<N> {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Before,
    Inside,
    After,
}

/// One range end in walk form. `after` marks "just past `node`".
#[derive(Debug, Clone, Copy)]
struct Edge<N> {
    node: N,
    offset: usize,
    after: bool,
}

fn normalize<T: DocumentTree>(tree: &T, boundary: Boundary<T::Node>, is_start: bool) -> Edge<T::Node> {
    if is_text(tree, boundary.node) {
        return Edge {
            node: boundary.node,
            offset: boundary.offset,
            after: false,
        };
    }
    let children = tree.children(boundary.node);
    if let Some(&child) = children.get(boundary.offset) {
        Edge {
            node: child,
            offset: 0,
            after: false,
        }
    } else if let Some(&last) = children.last() {
        Edge {
            node: last,
            offset: 0,
            after: true,
        }
    } else {
        Edge {
            node: boundary.node,
            offset: 0,
            after: is_start,
        }
    }
}

struct Walk<'p, N> {
    profile: &'p DocumentProfile,
    range: LiveRange<N>,
    start: Edge<N>,
    end: Edge<N>,
    cursor: Cursor,
    insertion: OverlayInsertion<N>,
}

/// Wrap every content-bearing part of `range` in markers from `factory`.
pub fn insert<T, F>(
    tree: &mut T,
    profile: &DocumentProfile,
    range: &LiveRange<T::Node>,
    factory: &mut F,
) -> OverlayInsertion<T::Node>
where
    T: DocumentTree,
    F: MarkerFactory<T> + ?Sized,
{
    let mut walk = Walk {
        profile,
        range: *range,
        start: normalize(tree, range.start, true),
        end: normalize(tree, range.end, false),
        cursor: Cursor::Before,
        insertion: OverlayInsertion::default(),
    };

    let Some(ancestor) = lowest_common_ancestor(tree, walk.start.node, walk.end.node) else {
        warn!("range ends live in different trees; nothing inserted");
        return walk.insertion;
    };

    if let Some(root) = profile.atomic_root_of(tree, ancestor) {
        debug!("range lies inside an atomic subtree; wrapping it whole");
        walk.wrap_atomic(tree, factory, root);
    } else {
        walk.visit(tree, factory, ancestor);
    }

    debug!("inserted {} marker(s)", walk.insertion.markers.len());
    walk.insertion
}

impl<N: Copy + Eq + std::hash::Hash + fmt::Debug> Walk<'_, N> {
    fn visit<T, F>(&mut self, tree: &mut T, factory: &mut F, node: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        if self.cursor == Cursor::After {
            return;
        }
        if self.cursor == Cursor::Before && !contains(tree, node, self.start.node) {
            return;
        }
        if self.profile.is_ignored_atomic(tree, node)
            && !contains(tree, node, self.start.node)
            && !contains(tree, node, self.end.node)
        {
            return;
        }
        if self.is_atomic_root(tree, node) {
            self.visit_atomic(tree, factory, node);
            return;
        }
        if node == self.start.node && self.cursor == Cursor::Before {
            self.visit_start(tree, factory, node);
            return;
        }
        if node == self.end.node {
            self.visit_end(tree, factory, node);
            return;
        }
        if is_text(tree, node) {
            if self.cursor == Cursor::Inside && !self.profile.is_artifact(tree, node) {
                self.wrap(tree, factory, node);
            }
            return;
        }
        self.visit_children(tree, factory, node);
    }

    fn visit_children<T, F>(&mut self, tree: &mut T, factory: &mut F, node: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        let snapshot = tree.children(node).to_vec();
        for child in snapshot {
            self.visit(tree, factory, child);
            if self.cursor == Cursor::After {
                break;
            }
        }
    }

    fn visit_start<T, F>(&mut self, tree: &mut T, factory: &mut F, node: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        let same_as_end = node == self.end.node;

        if self.start.after {
            self.cursor = if same_as_end { Cursor::After } else { Cursor::Inside };
            return;
        }

        if is_text(tree, node) {
            let len = char_len(tree, node);
            if same_as_end && !self.end.after {
                self.wrap_text_slice(tree, factory, node, self.start.offset, self.end.offset);
                self.cursor = Cursor::After;
            } else {
                self.wrap_text_slice(tree, factory, node, self.start.offset, len);
                self.cursor = if same_as_end { Cursor::After } else { Cursor::Inside };
            }
            return;
        }

        self.cursor = Cursor::Inside;
        if same_as_end && !self.end.after {
            self.cursor = Cursor::After;
            return;
        }
        self.visit_children(tree, factory, node);
        if same_as_end {
            self.cursor = Cursor::After;
        }
    }

    fn visit_end<T, F>(&mut self, tree: &mut T, factory: &mut F, node: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        if self.end.after {
            if is_text(tree, node) {
                if !self.profile.is_artifact(tree, node) {
                    self.wrap(tree, factory, node);
                }
            } else {
                self.visit_children(tree, factory, node);
            }
        } else if is_text(tree, node) {
            self.wrap_text_slice(tree, factory, node, 0, self.end.offset);
        }
        self.cursor = Cursor::After;
    }

    fn visit_atomic<T, F>(&mut self, tree: &mut T, factory: &mut F, root: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        let holds_end = contains(tree, root, self.end.node);

        if self.cursor == Cursor::Before && self.start.node == root && self.start.after {
            self.cursor = if holds_end { Cursor::After } else { Cursor::Inside };
            return;
        }
        if self.cursor == Cursor::Inside && self.end.node == root && !self.end.after {
            self.cursor = Cursor::After;
            return;
        }

        self.wrap_atomic(tree, factory, root);
        self.cursor = if holds_end { Cursor::After } else { Cursor::Inside };
    }

    fn wrap_atomic<T, F>(&mut self, tree: &mut T, factory: &mut F, root: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        let len = char_len(tree, root);
        let strictly_inside = |boundary: Boundary<N>| {
            text_offset_within(tree, root, boundary).is_some_and(|offset| offset > 0 && offset < len)
        };
        if strictly_inside(self.range.start) || strictly_inside(self.range.end) {
            let warning = PartialAtomicSubtreeWarning {
                root_tag: tree.tag_name(root).unwrap_or_default().to_string(),
            };
            warn!("{warning}");
            self.insertion.warnings.push(warning);
        }
        self.wrap(tree, factory, root);
    }

    fn is_atomic_root<T: DocumentTree<Node = N>>(&self, tree: &T, node: N) -> bool {
        self.profile.atomic_root_of(tree, node) == Some(node)
    }

    /// Wrap chars `from..to` of a text node, splitting off the unselected parts.
    fn wrap_text_slice<T, F>(&mut self, tree: &mut T, factory: &mut F, text: N, from: usize, to: usize)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        if self.profile.is_artifact(tree, text) {
            return;
        }
        let len = char_len(tree, text);
        let to = to.min(len);
        if from >= to {
            return;
        }

        if to < len {
            split_text(tree, text, to);
        }
        let target = if from > 0 {
            split_text(tree, text, from)
        } else {
            Some(text)
        };
        if let Some(target) = target {
            self.wrap(tree, factory, target);
        }
    }

    fn wrap<T, F>(&mut self, tree: &mut T, factory: &mut F, node: N)
    where
        T: DocumentTree<Node = N>,
        F: MarkerFactory<T> + ?Sized,
    {
        let (Some(parent), Some(index)) = (tree.parent(node), index_in_parent(tree, node)) else {
            return;
        };
        let marker = factory.create_marker(tree);
        tree.insert_child(parent, index, marker);
        tree.insert_child(marker, 0, node);
        self.insertion.markers.push(marker);
    }
}

/// Split a text node at char `at`; the tail becomes a new following sibling.
///
/// Returns the tail, or `None` when `at` is not strictly inside the text.
fn split_text<T: DocumentTree>(tree: &mut T, node: T::Node, at: usize) -> Option<T::Node> {
    let content = tree.text(node)?;
    let byte = content.char_indices().nth(at).map(|(byte, _)| byte)?;
    if byte == 0 {
        return None;
    }
    let (head, tail) = content.split_at(byte);
    let (head, tail) = (head.to_string(), tail.to_string());

    let parent = tree.parent(node)?;
    let index = index_in_parent(tree, node)?;
    tree.set_text(node, &head);
    let tail_node = tree.create_text(&tail);
    tree.insert_child(parent, index + 1, tail_node);
    Some(tail_node)
}

/// Unwrap `markers`, merging their text back into the neighbouring text nodes.
///
/// Detached markers are skipped. Non-text children (markers of other
/// annotations) are kept in place.
pub fn remove<T: DocumentTree>(tree: &mut T, markers: &[T::Node]) {
    for &marker in markers {
        let (Some(parent), Some(index)) = (tree.parent(marker), index_in_parent(tree, marker)) else {
            continue;
        };
        let children = tree.children(marker).to_vec();
        for (offset, &child) in children.iter().enumerate() {
            tree.insert_child(parent, index + 1 + offset, child);
        }
        tree.detach(marker);
        merge_text_run(tree, parent, index.saturating_sub(1), index + children.len());
    }
}

/// Merge adjacent text nodes among `parent`'s children `first..=last`.
fn merge_text_run<T: DocumentTree>(tree: &mut T, parent: T::Node, first: usize, last: usize) {
    let mut i = first;
    let mut last = last;
    while i < last {
        let children = tree.children(parent);
        let (Some(&a), Some(&b)) = (children.get(i), children.get(i + 1)) else {
            break;
        };
        match (tree.text(a), tree.text(b)) {
            (Some(head), Some(tail)) => {
                let merged = format!("{head}{tail}");
                tree.set_text(a, &merged);
                tree.detach(b);
                last -= 1;
            }
            _ => i += 1,
        }
    }
}
