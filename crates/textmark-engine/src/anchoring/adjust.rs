//! One-step boundary adjustment.
//!
//! Plain content moves by one grapheme cluster through the text leaves in
//! document order. Inside an atomic subtree characters have no meaning, so
//! movement steps structurally between real (marker-free) siblings and
//! children instead.

use std::cmp::Ordering;

use log::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::codec::{encode, node_path, resolve_path};
use super::logical::{logical_parent, real_children, real_next_sibling, real_previous_sibling};
use super::overlay::{MarkerFactory, OverlayInsertion, insert, remove};
use super::reconstruct::{Boundary, compare_boundaries, resolve};
use super::selector::{Endpoint, PathSelector};
use super::{Anchor, AnchorError};
use crate::profile::DocumentProfile;
use crate::tree::{DocumentTree, char_len, is_element, text_leaves};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// New selector plus the markers rendered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment<N> {
    pub selector: PathSelector,
    pub insertion: OverlayInsertion<N>,
}

/// Move one endpoint of `selector` one step and re-render it.
///
/// `markers` are the selector's current markers; they are removed first.
/// `selector` itself is left untouched so callers can restore it.
pub fn adjust<T, F>(
    tree: &mut T,
    profile: &DocumentProfile,
    selector: &PathSelector,
    markers: &[T::Node],
    endpoint: Endpoint,
    direction: Direction,
    factory: &mut F,
) -> Result<Adjustment<T::Node>, AnchorError>
where
    T: DocumentTree,
    F: MarkerFactory<T> + ?Sized,
{
    remove(tree, markers);

    let range = resolve(tree, profile, selector)?;
    let anchor = selector.anchor(endpoint);
    let moved = if is_structural(tree, profile, anchor)? {
        structural_step(tree, profile, anchor, endpoint, direction)?
    } else {
        let boundary = match endpoint {
            Endpoint::Start => range.start,
            Endpoint::End => range.end,
        };
        let stepped = plain_step(tree, profile, boundary, endpoint, direction);
        encode(tree, profile, stepped, endpoint == Endpoint::Start)?
    };
    debug!("moved {endpoint:?} {direction:?}: {anchor} -> {moved}");

    let selector = selector.with_anchor(endpoint, moved);
    let range = resolve(tree, profile, &selector)?;
    let insertion = insert(tree, profile, &range, factory);
    Ok(Adjustment {
        selector,
        insertion,
    })
}

/// True when the anchor's target lies strictly inside an atomic subtree.
fn is_structural<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    anchor: &Anchor,
) -> Result<bool, AnchorError> {
    let target = resolve_path(tree, profile, anchor.path())?;
    Ok(profile
        .atomic_root_of(tree, target)
        .is_some_and(|root| root != target))
}

fn structural_step<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    anchor: &Anchor,
    endpoint: Endpoint,
    direction: Direction,
) -> Result<Anchor, AnchorError> {
    let target = resolve_path(tree, profile, anchor.path())?;
    let path_of = |node: T::Node| node_path(tree, profile, node);
    let element = |node: Option<T::Node>| node.filter(|&n| is_element(tree, n));
    let parent_of = |node: T::Node| {
        logical_parent(tree, profile, node)
            .ok_or_else(|| AnchorError::drift(anchor.path(), "node has no parent"))
    };
    let first_real_child = |node: T::Node| real_children(tree, profile, node).first().copied();
    let last_real_child = |node: T::Node| real_children(tree, profile, node).last().copied();

    let next = match (anchor, direction) {
        (Anchor::Char(..), _) => match endpoint {
            Endpoint::Start => Anchor::Node(path_of(target)?),
            Endpoint::End => Anchor::AfterNode(path_of(target)?),
        },
        (Anchor::Node(_), Direction::Left) => match real_previous_sibling(tree, profile, target) {
            Some(previous) => match element(last_real_child(previous)) {
                Some(last) => Anchor::AfterNode(path_of(last)?),
                None => Anchor::Node(path_of(previous)?),
            },
            None => Anchor::Node(path_of(parent_of(target)?)?),
        },
        (Anchor::Node(_), Direction::Right) => match element(first_real_child(target)) {
            Some(first) => Anchor::Node(path_of(first)?),
            None => Anchor::AfterNode(path_of(target)?),
        },
        (Anchor::AfterNode(_), Direction::Right) => match real_next_sibling(tree, profile, target) {
            Some(next) => match element(first_real_child(next)) {
                Some(first) => Anchor::Node(path_of(first)?),
                None => Anchor::AfterNode(path_of(next)?),
            },
            None => Anchor::AfterNode(path_of(parent_of(target)?)?),
        },
        (Anchor::AfterNode(_), Direction::Left) => match element(last_real_child(target)) {
            Some(last) => Anchor::AfterNode(path_of(last)?),
            None => Anchor::Node(path_of(target)?),
        },
    };
    Ok(next)
}

/// Move `boundary` one grapheme cluster; unchanged at a document edge.
///
/// A result where two leaves meet is placed on the side the endpoint
/// decodes to: the next leaf's start for a start, the previous leaf's end
/// for an end.
fn plain_step<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    boundary: Boundary<T::Node>,
    endpoint: Endpoint,
    direction: Direction,
) -> Boundary<T::Node> {
    let leaves: Vec<T::Node> = text_leaves(tree, tree.root())
        .into_iter()
        .filter(|&leaf| {
            leaf == boundary.node
                || (char_len(tree, leaf) > 0
                    && !profile.is_artifact(tree, leaf)
                    && !inside_ignored(tree, profile, leaf))
        })
        .collect();

    let (mut index, mut offset) = match leaves.iter().position(|&leaf| leaf == boundary.node) {
        Some(index) => (index, boundary.offset),
        None => {
            // Element boundary: start from the nearest leaf on the side we move towards
            let found = match direction {
                Direction::Right => leaves.iter().position(|&leaf| {
                    compare_boundaries(tree, Boundary::new(leaf, 0), boundary) != Ordering::Less
                }),
                Direction::Left => leaves.iter().rposition(|&leaf| {
                    let end = Boundary::new(leaf, char_len(tree, leaf));
                    compare_boundaries(tree, end, boundary) != Ordering::Greater
                }),
            };
            let Some(index) = found else {
                return boundary;
            };
            let offset = match direction {
                Direction::Right => 0,
                Direction::Left => char_len(tree, leaves[index]),
            };
            (index, offset)
        }
    };

    loop {
        let text = tree.text(leaves[index]).unwrap_or_default();
        let stepped = match direction {
            Direction::Right => next_grapheme(text, offset),
            Direction::Left => previous_grapheme(text, offset),
        };
        if let Some(stepped) = stepped {
            let at_end = stepped == char_len(tree, leaves[index]);
            return match endpoint {
                Endpoint::Start if at_end && index + 1 < leaves.len() => Boundary::new(leaves[index + 1], 0),
                Endpoint::End if stepped == 0 && index > 0 => {
                    Boundary::new(leaves[index - 1], char_len(tree, leaves[index - 1]))
                }
                _ => Boundary::new(leaves[index], stepped),
            };
        }
        match direction {
            Direction::Right if index + 1 < leaves.len() => {
                index += 1;
                offset = 0;
            }
            Direction::Left if index > 0 => {
                index -= 1;
                offset = char_len(tree, leaves[index]);
            }
            _ => return boundary,
        }
    }
}

fn inside_ignored<T: DocumentTree>(tree: &T, profile: &DocumentProfile, leaf: T::Node) -> bool {
    let mut current = tree.parent(leaf);
    while let Some(node) = current {
        if profile.is_ignored_atomic(tree, node) {
            return true;
        }
        current = tree.parent(node);
    }
    false
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(byte, _)| byte)
}

/// Char offset one grapheme cluster after `offset`, if any.
fn next_grapheme(text: &str, offset: usize) -> Option<usize> {
    text[byte_offset(text, offset)..]
        .graphemes(true)
        .next()
        .map(|cluster| offset + cluster.chars().count())
}

/// Char offset one grapheme cluster before `offset`, if any.
fn previous_grapheme(text: &str, offset: usize) -> Option<usize> {
    text[..byte_offset(text, offset)]
        .graphemes(true)
        .next_back()
        .map(|cluster| offset - cluster.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse, to_markup};
    use crate::tree::{Document, NodeId};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn mark(doc: &mut Document) -> NodeId {
        doc.create_element("annotation-highlight")
    }

    fn selector(start: &str, end: &str) -> PathSelector {
        PathSelector::new(start.parse().unwrap(), end.parse().unwrap())
    }

    fn render(doc: &mut Document, profile: &DocumentProfile, selector: &PathSelector) -> Vec<NodeId> {
        let range = resolve(doc, profile, selector).unwrap();
        insert(doc, profile, &range, &mut mark).markers
    }

    #[test]
    fn start_moves_left_by_one_character() {
        let mut doc = parse("<html><body><p>Hello World</p></body></html>");
        let profile = DocumentProfile::default();
        let original = selector("char(/html/body/p,5)", "after-node(/html/body/p)");
        let markers = render(&mut doc, &profile, &original);

        let adjusted = adjust(
            &mut doc,
            &profile,
            &original,
            &markers,
            Endpoint::Start,
            Direction::Left,
            &mut mark,
        )
        .unwrap();

        assert_eq!(adjusted.selector.start.to_string(), "char(/html/body/p,4)");
        assert_eq!(adjusted.selector.end, original.end);
        assert_snapshot!(
            to_markup(&doc, doc.root()),
            @"<html><body><p>Hell<annotation-highlight>o World</annotation-highlight></p></body></html>"
        );
    }

    #[rstest]
    #[case("char(/p,1)", Endpoint::Start, Direction::Right, "char(/p,2)")]
    #[case("char(/p,3)", Endpoint::Start, Direction::Right, "char(/p/b,1)")]
    #[case("char(/p,1)", Endpoint::Start, Direction::Left, "node(/p)")]
    #[case("node(/p)", Endpoint::Start, Direction::Right, "char(/p,1)")]
    #[case("char(/p,6)", Endpoint::End, Direction::Right, "after-node(/p)")]
    #[case("after-node(/p)", Endpoint::End, Direction::Left, "char(/p,6)")]
    #[case("char(/p,2)", Endpoint::Start, Direction::Right, "node(/p/b)")]
    #[case("char(/p/b,1)", Endpoint::End, Direction::Left, "char(/p,3)")]
    fn plain_steps(
        #[case] start: &str,
        #[case] endpoint: Endpoint,
        #[case] direction: Direction,
        #[case] expected: &str,
    ) {
        let mut doc = parse("<p>abc<b>de</b>fg</p>");
        let profile = DocumentProfile::default();
        let original = match endpoint {
            Endpoint::Start => selector(start, "after-node(/p)"),
            Endpoint::End => selector("node(/p)", start),
        };

        let adjusted = adjust(&mut doc, &profile, &original, &[], endpoint, direction, &mut mark).unwrap();

        assert_eq!(adjusted.selector.anchor(endpoint).to_string(), expected);
    }

    #[test]
    fn steps_over_whitespace_artefacts_between_blocks() {
        let mut doc = parse("<div><p>ab</p>\n  <p>cd</p></div>");
        let profile = DocumentProfile::default();
        let original = selector("node(/div/p)", "after-node(/div/p)");

        let adjusted = adjust(&mut doc, &profile, &original, &[], Endpoint::End, Direction::Right, &mut mark)
            .unwrap();

        assert_eq!(adjusted.selector.end.to_string(), "char(/div/p[2],1)");
    }

    #[test]
    fn document_edges_leave_the_boundary_unchanged() {
        let mut doc = parse("<p>abc</p>");
        let profile = DocumentProfile::default();
        let original = selector("node(/p)", "after-node(/p)");

        let left = adjust(&mut doc, &profile, &original, &[], Endpoint::Start, Direction::Left, &mut mark)
            .unwrap();
        remove(&mut doc, &left.insertion.markers);
        let right = adjust(&mut doc, &profile, &original, &[], Endpoint::End, Direction::Right, &mut mark)
            .unwrap();

        assert_eq!(left.selector, original);
        assert_eq!(right.selector, original);
    }

    #[test]
    fn graphemes_move_as_one_unit() {
        let mut doc = parse("<p>ae\u{301}x</p>");
        let profile = DocumentProfile::default();
        let original = selector("char(/p,1)", "after-node(/p)");

        let adjusted = adjust(&mut doc, &profile, &original, &[], Endpoint::Start, Direction::Right, &mut mark)
            .unwrap();

        assert_eq!(adjusted.selector.start.to_string(), "char(/p,3)");
    }

    const FORMULA: &str =
        "<p>x<math><mrow><mi>a</mi><mo>+</mo><mi>b</mi></mrow><mn>2</mn></math>y</p>";

    #[rstest]
    #[case("char(/p/math/mrow/mo,0)", Endpoint::Start, Direction::Left, "node(/p/math/mrow/mo)")]
    #[case("char(/p/math/mrow/mo,1)", Endpoint::End, Direction::Right, "after-node(/p/math/mrow/mo)")]
    #[case("node(/p/math/mrow/mo)", Endpoint::Start, Direction::Left, "node(/p/math/mrow/mi)")]
    #[case("node(/p/math/mrow/mi)", Endpoint::Start, Direction::Left, "node(/p/math/mrow)")]
    #[case("node(/p/math/mn)", Endpoint::Start, Direction::Left, "after-node(/p/math/mrow/mi[2])")]
    #[case("node(/p/math/mrow/mi)", Endpoint::Start, Direction::Right, "after-node(/p/math/mrow/mi)")]
    #[case("after-node(/p/math/mrow/mi)", Endpoint::End, Direction::Right, "after-node(/p/math/mrow/mo)")]
    #[case("after-node(/p/math/mrow/mi[2])", Endpoint::End, Direction::Right, "after-node(/p/math/mrow)")]
    #[case("after-node(/p/math/mrow)", Endpoint::End, Direction::Left, "after-node(/p/math/mrow/mi[2])")]
    #[case("after-node(/p/math/mrow/mo)", Endpoint::End, Direction::Left, "node(/p/math/mrow/mo)")]
    fn structural_steps_inside_formulas(
        #[case] anchor: &str,
        #[case] endpoint: Endpoint,
        #[case] direction: Direction,
        #[case] expected: &str,
    ) {
        let doc = parse(FORMULA);
        let profile = DocumentProfile::default();
        let anchor: Anchor = anchor.parse().unwrap();

        let moved = structural_step(&doc, &profile, &anchor, endpoint, direction).unwrap();

        assert_eq!(moved.to_string(), expected);
    }

    #[test]
    fn structural_steps_see_through_markers() {
        let mut doc = parse(FORMULA);
        let profile = DocumentProfile::default();
        let whole = selector("node(/p/math)", "after-node(/p/math)");
        let markers = render(&mut doc, &profile, &whole);
        assert_eq!(markers.len(), 1);

        let anchor: Anchor = "node(/p/math/mn)".parse().unwrap();
        let moved = structural_step(&doc, &profile, &anchor, Endpoint::Start, Direction::Left).unwrap();

        assert_eq!(moved.to_string(), "after-node(/p/math/mrow/mi[2])");
    }

    #[test]
    fn adjust_inside_formula_rewraps_the_whole_root() {
        let mut doc = parse(FORMULA);
        let profile = DocumentProfile::default();
        let original = selector("node(/p/math/mrow/mo)", "after-node(/p/math/mrow/mo)");
        let markers = render(&mut doc, &profile, &original);

        let adjusted = adjust(
            &mut doc,
            &profile,
            &original,
            &markers,
            Endpoint::Start,
            Direction::Left,
            &mut mark,
        )
        .unwrap();

        assert_eq!(adjusted.selector.start.to_string(), "node(/p/math/mrow/mi)");
        assert_eq!(adjusted.insertion.markers.len(), 1);
        assert_eq!(doc.children(doc.document_element().unwrap()).len(), 3);
    }

    #[rstest]
    #[case("abc", 1, Some(2), Some(0))]
    #[case("abc", 0, Some(1), None)]
    #[case("abc", 3, None, Some(2))]
    #[case("e\u{301}!", 0, Some(2), None)]
    fn grapheme_helpers(
        #[case] text: &str,
        #[case] offset: usize,
        #[case] next: Option<usize>,
        #[case] previous: Option<usize>,
    ) {
        assert_eq!(next_grapheme(text, offset), next);
        assert_eq!(previous_grapheme(text, offset), previous);
    }
}
