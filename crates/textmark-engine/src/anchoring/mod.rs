/*!
 * # Anchoring and Overlay
 *
 * Turns live positions in a [`DocumentTree`](crate::tree::DocumentTree)
 * into stable textual anchors and back, and renders anchored ranges as
 * marker wrapper elements.
 *
 * ## Architecture Overview
 *
 * ### 1. Anchors Are Structural Paths
 * - An [`Anchor`] is `node(path)`, `after-node(path)` or `char(path,n)`
 * - Paths are `tag[ordinal]` segments from the document root; `[1]` is omitted
 * - Char offsets count Unicode scalar values in the addressed node's text content
 *
 * ### 2. Markers Are Invisible
 * - Overlay markers are skipped when building paths and counting ordinals
 * - Offsets sum preceding text through every enclosing marker
 * - Inserting one annotation's markers never changes what another annotation's
 *   anchors resolve to
 *
 * ### 3. Resolve, Use, Discard
 * - A [`LiveRange`] is resolved from a [`PathSelector`] right before it is used
 * - Nothing holds a live node across a mutation except the marker handles
 *   returned by [`insert`], which [`remove`] needs
 *
 * ### 4. Atomic Subtrees
 * - Formula markup (`math` by default) is wrapped whole or not at all
 * - Boundary adjustment inside it moves structurally instead of by character
 *
 * ## Module Structure
 *
 * - **`anchor`**: `Anchor`, `NodePath` and the anchor string grammar
 * - **`codec`**: `encode` / `decode` between live boundaries and anchors
 * - **`reconstruct`**: `resolve` a selector into a `LiveRange`, boundary ordering
 * - **`overlay`**: marker `insert` / `remove`
 * - **`adjust`**: one-step boundary movement
 * - **`selector`**: `PathSelector`, discontinuous targets and their JSON
 * - **`logical`**: marker-transparent tree navigation
 *
 * ## Usage Pattern
 *
 * ```rust
 * use textmark_engine::anchoring::*;
 * use textmark_engine::markup::{parse, to_markup};
 * use textmark_engine::profile::DocumentProfile;
 * use textmark_engine::tree::DocumentTree;
 *
 * let mut doc = parse("<html><body><p>Hello World</p></body></html>");
 * let profile = DocumentProfile::default();
 *
 * let selector = PathSelector::new(
 *     "char(/html/body/p,6)".parse().unwrap(),
 *     "after-node(/html/body/p)".parse().unwrap(),
 * );
 * let range = resolve(&doc, &profile, &selector).unwrap();
 * let mut factory = AnnotationMarkerFactory::new(&profile, "a1");
 * let inserted = insert(&mut doc, &profile, &range, &mut factory);
 *
 * assert_eq!(
 *     to_markup(&doc, doc.root()),
 *     "<html><body><p>Hello <annotation-highlight data-annotation=\"a1\">World</annotation-highlight></p></body></html>"
 * );
 *
 * remove(&mut doc, &inserted.markers);
 * assert_eq!(to_markup(&doc, doc.root()), "<html><body><p>Hello World</p></body></html>");
 * ```
 */

pub mod adjust;
pub mod anchor;
pub mod codec;
pub mod error;
pub mod logical;
pub mod overlay;
pub mod reconstruct;
pub mod selector;

pub use adjust::{Adjustment, Direction, adjust};
pub use anchor::{Anchor, NodePath, PathSegment};
pub use codec::{Bias, Decoded, decode, encode, node_path, resolve_path};
pub use error::AnchorError;
pub use overlay::{
    AnnotationMarkerFactory, MarkerFactory, OverlayInsertion, PartialAtomicSubtreeWarning, insert,
    remove,
};
pub use reconstruct::{
    Boundary, LiveRange, compare_boundaries, resolve, resolve_anchor, text_offset_within,
};
pub use selector::{
    DiscontinuousSelector, Endpoint, OffsetSelector, PathSelector, Selector, TargetSelector,
    add_fragment,
};

use crate::profile::DocumentProfile;
use crate::tree::DocumentTree;

/// Encode a live range as a [`PathSelector`].
pub fn encode_range<T: DocumentTree>(
    tree: &T,
    profile: &DocumentProfile,
    range: &LiveRange<T::Node>,
) -> Result<PathSelector, AnchorError> {
    Ok(PathSelector::new(
        encode(tree, profile, range.start, true)?,
        encode(tree, profile, range.end, false)?,
    ))
}
