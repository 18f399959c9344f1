use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::AnchorError;

/// One `tag[ordinal]` step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Always lower-case
    pub tag: String,
    /// 1-based among same-tag, same-namespace logical siblings
    pub ordinal: usize,
}

impl PathSegment {
    pub fn new(tag: &str, ordinal: usize) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ordinal,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal == 1 {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{}[{}]", self.tag, self.ordinal)
        }
    }
}

/// Structural locator from the document root down to an element.
///
/// The empty path addresses the document node itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(pub Vec<PathSegment>);

impl NodePath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the `/html/body/p[2]` part of an anchor string.
    pub fn parse(source: &str, anchor: &str) -> Result<Self, AnchorError> {
        static SEGMENT_REGEX: OnceLock<Regex> = OnceLock::new();
        let segment_regex = SEGMENT_REGEX.get_or_init(|| {
            Regex::new(r"^([a-z][a-z0-9:_.-]*)(?:\[\s*(\d+)\s*\])?$").expect("Invalid segment regex")
        });

        let trimmed = source.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::default());
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(AnchorError::malformed(anchor, "path must start with '/'"));
        };

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            let lower = raw.trim().to_ascii_lowercase();
            let caps = segment_regex
                .captures(&lower)
                .ok_or_else(|| AnchorError::malformed(anchor, format!("bad segment '{raw}'")))?;
            let ordinal = match caps.get(2) {
                Some(digits) => digits
                    .as_str()
                    .parse::<usize>()
                    .map_err(|e| AnchorError::malformed(anchor, e.to_string()))?,
                None => 1,
            };
            if ordinal == 0 {
                return Err(AnchorError::malformed(anchor, "ordinals start at 1"));
            }
            segments.push(PathSegment::new(&caps[1], ordinal));
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// A persisted boundary position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Anchor {
    /// Immediately before the node at the path
    Node(NodePath),
    /// Immediately after the node at the path
    AfterNode(NodePath),
    /// `n` Unicode scalar values into the text content of the node at the path
    Char(NodePath, usize),
}

impl Anchor {
    pub fn path(&self) -> &NodePath {
        match self {
            Anchor::Node(path) | Anchor::AfterNode(path) | Anchor::Char(path, _) => path,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Node(path) => write!(f, "node({path})"),
            Anchor::AfterNode(path) => write!(f, "after-node({path})"),
            Anchor::Char(path, offset) => write!(f, "char({path},{offset})"),
        }
    }
}

impl FromStr for Anchor {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();
        let prefix_regex = PREFIX_REGEX.get_or_init(|| {
            Regex::new(r"(?i)^\s*(after-node|node|char)\s*\(").expect("Invalid prefix regex")
        });

        let caps = prefix_regex
            .captures(s)
            .ok_or_else(|| AnchorError::UnsupportedAnchorPrefix(s.to_string()))?;
        let prefix = caps[1].to_ascii_lowercase();
        let body_start = caps.get(0).map_or(0, |m| m.end());
        let body = s[body_start..]
            .trim_end()
            .strip_suffix(')')
            .ok_or_else(|| AnchorError::malformed(s, "missing closing parenthesis"))?;

        match prefix.as_str() {
            "node" => Ok(Anchor::Node(NodePath::parse(body, s)?)),
            "after-node" => Ok(Anchor::AfterNode(NodePath::parse(body, s)?)),
            _ => {
                let (path, offset) = body
                    .rsplit_once(',')
                    .ok_or_else(|| AnchorError::malformed(s, "char anchor needs an offset"))?;
                let offset = offset
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| AnchorError::malformed(s, format!("bad offset: {e}")))?;
                Ok(Anchor::Char(NodePath::parse(path, s)?, offset))
            }
        }
    }
}

impl TryFrom<String> for Anchor {
    type Error = AnchorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn path(segments: &[(&str, usize)]) -> NodePath {
        NodePath(
            segments
                .iter()
                .map(|(tag, ordinal)| PathSegment::new(tag, *ordinal))
                .collect(),
        )
    }

    #[test]
    fn prints_with_first_ordinal_omitted() {
        let anchor = Anchor::Char(path(&[("html", 1), ("body", 1), ("p", 2)]), 5);
        assert_eq!(anchor.to_string(), "char(/html/body/p[2],5)");
    }

    #[rstest]
    #[case("node(/html/body/p)", Anchor::Node(path(&[("html", 1), ("body", 1), ("p", 1)])))]
    #[case("NODE(/HTML/Body/P[1])", Anchor::Node(path(&[("html", 1), ("body", 1), ("p", 1)])))]
    #[case("after-node(/html/body/div[3])", Anchor::AfterNode(path(&[("html", 1), ("body", 1), ("div", 3)])))]
    #[case("char(/html/body/p, 12 )", Anchor::Char(path(&[("html", 1), ("body", 1), ("p", 1)]), 12))]
    #[case("char(/math/mi[2],0)", Anchor::Char(path(&[("math", 1), ("mi", 2)]), 0))]
    #[case("node()", Anchor::Node(NodePath::default()))]
    fn parses_anchor_strings(#[case] input: &str, #[case] expected: Anchor) {
        assert_eq!(input.parse::<Anchor>().unwrap(), expected);
    }

    #[rstest]
    #[case("xpointer(/html)")]
    #[case("")]
    #[case("/html/body")]
    fn rejects_unknown_prefixes(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Anchor>(),
            Err(AnchorError::UnsupportedAnchorPrefix(_))
        ));
    }

    #[rstest]
    #[case("node(/html/body")]
    #[case("node(html/body)")]
    #[case("char(/html/body/p)")]
    #[case("char(/html/body/p,-1)")]
    #[case("node(/html/p[0])")]
    #[case("node(/html/<p>)")]
    fn rejects_malformed_bodies(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Anchor>(),
            Err(AnchorError::MalformedAnchor { .. })
        ));
    }

    #[test]
    fn serde_uses_the_string_form() {
        let anchor: Anchor = "after-node(/html/body/table/tr[2])".parse().unwrap();
        let json = serde_json::to_string(&anchor).unwrap();
        assert_eq!(json, r#""after-node(/html/body/table/tr[2])""#);
        assert_eq!(serde_json::from_str::<Anchor>(&json).unwrap(), anchor);
    }
}
