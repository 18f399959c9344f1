//! # Markup reader and writer
//!
//! Turns an HTML-ish string into a [`Document`] and back. The reader is the
//! way fixtures and hosts without a live renderer get a tree to anchor
//! against; the writer makes overlay results easy to inspect.
//!
//! ```text
//! Source Text → Lexer → Tokens → Builder → Document
//!               (Logos)         (open-element stack)
//! ```
//!
//! The reader is tolerant rather than validating: stray close tags are
//! ignored, unclosed elements end at end of input, and void elements never
//! take children. Text is kept byte-for-byte (after entity decoding), so
//! whitespace-only artefacts between block elements survive exactly as a
//! browser would keep them.

pub mod lexer;

use std::sync::OnceLock;

use regex::Regex;

use crate::tree::{Document, DocumentTree, NodeId, NodeKind};
use lexer::{TokenKind, lex};

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &["br", "img", "hr", "input", "meta", "link", "wbr", "col"];

/// Parse markup into a fresh [`Document`].
pub fn parse(input: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, input);
    doc
}

/// Parse markup and append the resulting nodes under `parent`.
pub fn parse_into(doc: &mut Document, parent: NodeId, input: &str) {
    let mut stack: Vec<(NodeId, String)> = vec![(parent, String::new())];

    for token in lex(input) {
        let Some(&(top, _)) = stack.last() else {
            break;
        };
        match token.kind {
            TokenKind::Declaration => {}
            TokenKind::Text => {
                let decoded = html_escape::decode_html_entities(token.text);
                append_text_merged(doc, top, &decoded);
            }
            TokenKind::OpenTag => {
                let Some(tag) = parse_open_tag(token.text) else {
                    append_text_merged(doc, top, token.text);
                    continue;
                };
                let element = doc.append_element(top, &tag.name);
                for (name, value) in &tag.attributes {
                    doc.set_attribute(element, name, value);
                }
                let lower = tag.name.to_ascii_lowercase();
                if !tag.self_closing && !VOID_ELEMENTS.contains(&lower.as_str()) {
                    stack.push((element, lower));
                }
            }
            TokenKind::CloseTag => {
                let name = token
                    .text
                    .trim_start_matches("</")
                    .trim_end_matches('>')
                    .trim()
                    .to_ascii_lowercase();
                // Only close when an open element matches; the bottom entry is the parent itself
                if let Some(position) = stack.iter().skip(1).rposition(|(_, open)| *open == name) {
                    stack.truncate(position + 1);
                }
            }
        }
    }
}

/// Serialize `node` (and its subtree) back to markup.
///
/// The document node serializes as the concatenation of its children.
pub fn to_markup<T: AttributeSource>(tree: &T, node: T::Node) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

/// Attribute enumeration needed by the writer; the [`DocumentTree`] trait
/// only offers lookup by name.
pub trait AttributeSource: DocumentTree {
    fn attribute_pairs(&self, node: Self::Node) -> Vec<(String, String)>;
}

impl AttributeSource for Document {
    fn attribute_pairs(&self, node: NodeId) -> Vec<(String, String)> {
        self.attributes(node).to_vec()
    }
}

fn write_node<T: AttributeSource>(tree: &T, node: T::Node, out: &mut String) {
    match tree.kind(node) {
        NodeKind::Text => {
            out.push_str(&html_escape::encode_text(tree.text(node).unwrap_or_default()));
        }
        NodeKind::Document => {
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
        }
        NodeKind::Element => {
            let tag = tree.tag_name(node).unwrap_or_default();
            out.push('<');
            out.push_str(tag);
            for (name, value) in tree.attribute_pairs(node) {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(&value));
                out.push('"');
            }
            out.push('>');
            let children = tree.children(node);
            if children.is_empty() && VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                return;
            }
            for &child in children {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn append_text_merged(doc: &mut Document, parent: NodeId, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(&last) = doc.children(parent).last()
        && let Some(existing) = doc.text(last)
    {
        let merged = format!("{existing}{text}");
        doc.set_text(last, &merged);
        return;
    }
    doc.append_text(parent, text);
}

struct OpenTag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
}

fn parse_open_tag(source: &str) -> Option<OpenTag> {
    static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    static ATTR_REGEX: OnceLock<Regex> = OnceLock::new();

    let tag_regex = TAG_REGEX
        .get_or_init(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9:_-]*)").expect("Invalid tag regex"));
    let attr_regex = ATTR_REGEX.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+)))?"#)
            .expect("Invalid attribute regex")
    });

    let name_match = tag_regex.captures(source)?;
    let name = name_match.get(1)?.as_str().to_string();
    let rest = &source[name_match.get(0)?.end()..];
    let self_closing = rest.trim_end_matches('>').trim_end().ends_with('/');

    let attributes = attr_regex
        .captures_iter(rest)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
                .unwrap_or_default();
            Some((key, value))
        })
        .collect();

    Some(OpenTag {
        name,
        attributes,
        self_closing,
    })
}
