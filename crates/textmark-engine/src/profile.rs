use serde::{Deserialize, Serialize};

use crate::tree::{DocumentTree, is_element, tag_lower};

/// An implicit structural layer a host may insert between `parent` and its
/// rows, e.g. the `tbody` browsers add under every `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitWrapper {
    pub parent: String,
    pub wrapper: String,
}

/// Which tag vocabulary a node belongs to for path-segment matching.
///
/// Formula markup is matched in its own namespace so that e.g. a MathML
/// `<mi>` ordinal never counts, or is counted by, surrounding content tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceClass {
    Content,
    Atomic,
}

/// Vocabulary shared by the codec, the overlay engine and the adjuster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentProfile {
    /// Tag of inserted overlay wrappers; these are invisible to paths
    pub marker_tag: String,
    /// Roots of atomic subtrees that are wrapped whole or not at all
    pub atomic_roots: Vec<String>,
    /// Tags that leave the atomic namespace again (HTML embedded in formulas)
    pub atomic_escape_tags: Vec<String>,
    /// Tags inside atomic subtrees the overlay never touches
    pub atomic_ignored_tags: Vec<String>,
    /// Whether whitespace-only text nodes are treated as parser artefacts
    pub skip_whitespace_artifacts: bool,
    pub implicit_wrappers: Vec<ImplicitWrapper>,
}

impl Default for DocumentProfile {
    fn default() -> Self {
        Self {
            marker_tag: "annotation-highlight".to_string(),
            atomic_roots: vec!["math".to_string()],
            atomic_escape_tags: vec!["a".to_string(), "span".to_string()],
            atomic_ignored_tags: vec!["annotation".to_string(), "annotation-xml".to_string()],
            skip_whitespace_artifacts: true,
            implicit_wrappers: vec![ImplicitWrapper {
                parent: "table".to_string(),
                wrapper: "tbody".to_string(),
            }],
        }
    }
}

fn listed(list: &[String], tag: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(tag))
}

impl DocumentProfile {
    pub fn is_marker<T: DocumentTree>(&self, tree: &T, node: T::Node) -> bool {
        tree.tag_name(node)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(&self.marker_tag))
    }

    pub fn is_atomic_root_tag(&self, tag: &str) -> bool {
        listed(&self.atomic_roots, tag)
    }

    pub fn is_escape_tag(&self, tag: &str) -> bool {
        listed(&self.atomic_escape_tags, tag)
    }

    /// True for tags like `annotation-xml` that only matter inside a formula.
    pub fn is_ignored_atomic<T: DocumentTree>(&self, tree: &T, node: T::Node) -> bool {
        tree.tag_name(node)
            .is_some_and(|tag| listed(&self.atomic_ignored_tags, tag))
            && self.atomic_root_of(tree, node).is_some()
    }

    /// Artefact text: whitespace-only, and the profile says to skip it.
    pub fn is_artifact<T: DocumentTree>(&self, tree: &T, node: T::Node) -> bool {
        self.skip_whitespace_artifacts && crate::tree::is_whitespace_text(tree, node)
    }

    /// The innermost atomic root at or above `node`, unless an escape tag
    /// sits in between.
    pub fn atomic_root_of<T: DocumentTree>(&self, tree: &T, node: T::Node) -> Option<T::Node> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if let Some(tag) = tree.tag_name(candidate) {
                if self.is_escape_tag(tag) {
                    return None;
                }
                if self.is_atomic_root_tag(tag) {
                    return Some(candidate);
                }
            }
            current = tree.parent(candidate);
        }
        None
    }

    pub fn namespace_class<T: DocumentTree>(&self, tree: &T, node: T::Node) -> NamespaceClass {
        match self.atomic_root_of(tree, node) {
            Some(_) => NamespaceClass::Atomic,
            None => NamespaceClass::Content,
        }
    }

    /// Namespace a path segment with `tag` lands in, given the class of its parent segment.
    pub fn class_after_segment(&self, parent: NamespaceClass, tag: &str) -> NamespaceClass {
        if self.is_escape_tag(tag) {
            NamespaceClass::Content
        } else if self.is_atomic_root_tag(tag) {
            NamespaceClass::Atomic
        } else {
            parent
        }
    }

    /// Wrapper tag a host may silently insert directly under `parent_tag`.
    pub fn implicit_wrapper_under(&self, parent_tag: &str) -> Option<&str> {
        self.implicit_wrappers
            .iter()
            .find(|rule| rule.parent.eq_ignore_ascii_case(parent_tag))
            .map(|rule| rule.wrapper.as_str())
    }

    /// True when `node` is the first implicit wrapper element under its configured parent.
    ///
    /// Only the first one is elided from paths; a second `tbody` is real structure.
    pub fn is_elided_wrapper<T: DocumentTree>(&self, tree: &T, node: T::Node) -> bool {
        let (Some(tag), Some(parent)) = (tag_lower(tree, node), tree.parent(node)) else {
            return false;
        };
        let Some(parent_tag) = tag_lower(tree, parent) else {
            return false;
        };
        let Some(wrapper) = self.implicit_wrapper_under(&parent_tag) else {
            return false;
        };
        if !tag.eq_ignore_ascii_case(wrapper) {
            return false;
        }
        tree.children(parent)
            .iter()
            .copied()
            .find(|&child| {
                is_element(tree, child)
                    && tree
                        .tag_name(child)
                        .is_some_and(|t| t.eq_ignore_ascii_case(wrapper))
            })
            == Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;
    use crate::tree::{DocumentTree, first_text_leaf};

    #[test]
    fn default_profile_vocabulary() {
        let profile = DocumentProfile::default();
        assert!(profile.is_atomic_root_tag("MATH"));
        assert!(profile.is_escape_tag("span"));
        assert_eq!(profile.implicit_wrapper_under("table"), Some("tbody"));
        assert_eq!(profile.implicit_wrapper_under("div"), None);
    }

    #[test]
    fn atomic_root_found_through_formula_descendants() {
        let doc = parse("<p>x<math><mrow><mi>a</mi></mrow></math></p>");
        let profile = DocumentProfile::default();
        let p = doc.document_element().unwrap();
        let math = doc.children(p)[1];
        let leaf = first_text_leaf(&doc, math).unwrap();

        assert_eq!(profile.atomic_root_of(&doc, leaf), Some(math));
        assert_eq!(profile.atomic_root_of(&doc, p), None);
        assert_eq!(profile.namespace_class(&doc, math), NamespaceClass::Atomic);
        assert_eq!(profile.namespace_class(&doc, p), NamespaceClass::Content);
    }

    #[test]
    fn escape_tags_leave_the_atomic_namespace() {
        let doc = parse("<math><mtext><span>plain</span></mtext></math>");
        let profile = DocumentProfile::default();
        let leaf = first_text_leaf(&doc, doc.root()).unwrap();
        assert_eq!(profile.atomic_root_of(&doc, leaf), None);
    }

    #[test]
    fn only_first_tbody_is_elided() {
        let doc = parse("<table><tbody><tr><td>a</td></tr></tbody><tbody><tr><td>b</td></tr></tbody></table>");
        let profile = DocumentProfile::default();
        let table = doc.document_element().unwrap();
        let bodies = doc.children(table).to_vec();

        assert!(profile.is_elided_wrapper(&doc, bodies[0]));
        assert!(!profile.is_elided_wrapper(&doc, bodies[1]));
    }

    #[test]
    fn class_after_segment_follows_escape_and_root_tags() {
        let profile = DocumentProfile::default();
        let class = profile.class_after_segment(NamespaceClass::Content, "math");
        assert_eq!(class, NamespaceClass::Atomic);
        assert_eq!(profile.class_after_segment(class, "mi"), NamespaceClass::Atomic);
        assert_eq!(profile.class_after_segment(class, "span"), NamespaceClass::Content);
    }
}
