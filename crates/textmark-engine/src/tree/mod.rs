//! # Document tree abstraction
//!
//! Every anchoring component works against the small [`DocumentTree`] trait
//! instead of a concrete rendering host. A host (a browser bridge, a native
//! renderer, a test fixture) only has to expose parent/child/tag/text access
//! and a handful of mutations; everything else in this module is a pure
//! function layered on top of the trait.
//!
//! [`Document`] is the in-crate arena implementation used by the markup
//! reader and by the test-suite.

mod document;

pub use document::{Document, NodeId};

/// Coarse node classification, mirroring the three node types the
/// anchoring code cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The tree root. Has no tag and is never addressed by a path segment.
    Document,
    Element,
    Text,
}

/// Minimal interface to a live, synchronously mutable document tree.
///
/// Node handles must stay valid while a node is detached so that markers
/// can be moved around without losing identity.
pub trait DocumentTree {
    type Node: Copy + Eq + std::hash::Hash + std::fmt::Debug;

    fn root(&self) -> Self::Node;
    fn kind(&self, node: Self::Node) -> NodeKind;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn children(&self, node: Self::Node) -> &[Self::Node];
    /// Tag name as stored by the host (case preserved). `None` for text and document nodes.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
    /// Text of a text node. `None` for elements and the document.
    fn text(&self, node: Self::Node) -> Option<&str>;
    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn create_text(&mut self, text: &str) -> Self::Node;
    fn set_text(&mut self, node: Self::Node, text: &str);
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);
    /// Insert `child` under `parent` at `index`.
    ///
    /// `child` is detached from its current parent first; `index` refers to
    /// the child list after that detach and is clamped to its length.
    fn insert_child(&mut self, parent: Self::Node, index: usize, child: Self::Node);
    /// Remove `node` from its parent. The node and its subtree stay alive.
    fn detach(&mut self, node: Self::Node);
}

pub fn is_text<T: DocumentTree>(tree: &T, node: T::Node) -> bool {
    tree.kind(node) == NodeKind::Text
}

pub fn is_element<T: DocumentTree>(tree: &T, node: T::Node) -> bool {
    tree.kind(node) == NodeKind::Element
}

/// Lower-cased tag name, used for every comparison against paths and the profile.
pub fn tag_lower<T: DocumentTree>(tree: &T, node: T::Node) -> Option<String> {
    tree.tag_name(node).map(str::to_ascii_lowercase)
}

/// True for text nodes made only of whitespace (parser artefacts between blocks).
pub fn is_whitespace_text<T: DocumentTree>(tree: &T, node: T::Node) -> bool {
    tree.text(node)
        .is_some_and(|text| text.chars().all(char::is_whitespace))
}

pub fn index_in_parent<T: DocumentTree>(tree: &T, node: T::Node) -> Option<usize> {
    let parent = tree.parent(node)?;
    tree.children(parent).iter().position(|&child| child == node)
}

pub fn next_sibling<T: DocumentTree>(tree: &T, node: T::Node) -> Option<T::Node> {
    let parent = tree.parent(node)?;
    let index = index_in_parent(tree, node)?;
    tree.children(parent).get(index + 1).copied()
}

pub fn previous_sibling<T: DocumentTree>(tree: &T, node: T::Node) -> Option<T::Node> {
    let parent = tree.parent(node)?;
    let index = index_in_parent(tree, node)?;
    index
        .checked_sub(1)
        .and_then(|prev| tree.children(parent).get(prev).copied())
}

/// Number of Unicode scalar values in the text content rooted at `node`.
pub fn char_len<T: DocumentTree>(tree: &T, node: T::Node) -> usize {
    match tree.text(node) {
        Some(text) => text.chars().count(),
        None => tree
            .children(node)
            .iter()
            .map(|&child| char_len(tree, child))
            .sum(),
    }
}

/// Concatenated text of every text node below `node`, in document order.
pub fn text_content<T: DocumentTree>(tree: &T, node: T::Node) -> String {
    let mut out = String::new();
    collect_text(tree, node, &mut out);
    out
}

fn collect_text<T: DocumentTree>(tree: &T, node: T::Node, out: &mut String) {
    if let Some(text) = tree.text(node) {
        out.push_str(text);
        return;
    }
    for &child in tree.children(node) {
        collect_text(tree, child, out);
    }
}

/// Ancestors of `node`, starting with `node` itself and ending at the top of its tree.
pub fn inclusive_ancestors<T: DocumentTree>(tree: &T, node: T::Node) -> Vec<T::Node> {
    let mut chain = vec![node];
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        chain.push(parent);
        current = parent;
    }
    chain
}

/// DOM-style `contains`: true when `node` is `ancestor` or lies below it.
pub fn contains<T: DocumentTree>(tree: &T, ancestor: T::Node, node: T::Node) -> bool {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if candidate == ancestor {
            return true;
        }
        current = tree.parent(candidate);
    }
    false
}

/// True when `node` is connected to the tree root.
pub fn is_attached<T: DocumentTree>(tree: &T, node: T::Node) -> bool {
    contains(tree, tree.root(), node)
}

pub fn lowest_common_ancestor<T: DocumentTree>(
    tree: &T,
    a: T::Node,
    b: T::Node,
) -> Option<T::Node> {
    let chain_a = inclusive_ancestors(tree, a);
    inclusive_ancestors(tree, b)
        .into_iter()
        .find(|candidate| chain_a.contains(candidate))
}

/// Child indices leading from the top of the tree down to `node`.
pub fn index_path<T: DocumentTree>(tree: &T, node: T::Node) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut current = node;
    while let Some(index) = index_in_parent(tree, current) {
        indices.push(index);
        // index_in_parent only succeeds when a parent exists
        match tree.parent(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    indices.reverse();
    indices
}

/// First text node at or below `node` in document order.
pub fn first_text_leaf<T: DocumentTree>(tree: &T, node: T::Node) -> Option<T::Node> {
    if is_text(tree, node) {
        return Some(node);
    }
    tree.children(node)
        .iter()
        .find_map(|&child| first_text_leaf(tree, child))
}

/// Every text node below `node`, in document order.
pub fn text_leaves<T: DocumentTree>(tree: &T, node: T::Node) -> Vec<T::Node> {
    let mut leaves = Vec::new();
    collect_leaves(tree, node, &mut leaves);
    leaves
}

fn collect_leaves<T: DocumentTree>(tree: &T, node: T::Node, out: &mut Vec<T::Node>) {
    if is_text(tree, node) {
        out.push(node);
        return;
    }
    for &child in tree.children(node) {
        collect_leaves(tree, child, out);
    }
}
