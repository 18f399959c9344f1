//! Selector values and their JSON interchange form.
//!
//! ```json
//! { "type": "PathSelector", "startPath": "node(/html/body/p)", "endPath": "char(/html/body/p,5)" }
//! ```
//!
//! A discontinuous target is a `PathSelector` spanning its first and last
//! fragments, refined by a `ListSelector` holding every fragment.

use std::fmt;

use log::warn;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::Anchor;

/// Which anchor of a [`PathSelector`] an operation affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

/// One contiguous range. Immutable: adjustment builds a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename = "PathSelector")]
pub struct PathSelector {
    #[serde(rename = "startPath")]
    pub start: Anchor,
    #[serde(rename = "endPath")]
    pub end: Anchor,
}

impl PathSelector {
    pub fn new(start: Anchor, end: Anchor) -> Self {
        Self { start, end }
    }

    pub fn anchor(&self, endpoint: Endpoint) -> &Anchor {
        match endpoint {
            Endpoint::Start => &self.start,
            Endpoint::End => &self.end,
        }
    }

    /// Copy of `self` with one anchor replaced.
    pub fn with_anchor(&self, endpoint: Endpoint, anchor: Anchor) -> Self {
        match endpoint {
            Endpoint::Start => Self::new(anchor, self.end.clone()),
            Endpoint::End => Self::new(self.start.clone(), anchor),
        }
    }
}

impl fmt::Display for PathSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Ordered, append-only list of fragments forming one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscontinuousSelector {
    fragments: Vec<PathSelector>,
}

impl DiscontinuousSelector {
    /// `None` for an empty list; a discontinuous selector always has a fragment.
    pub fn from_fragments(fragments: Vec<PathSelector>) -> Option<Self> {
        (!fragments.is_empty()).then_some(Self { fragments })
    }

    pub fn fragments(&self) -> &[PathSelector] {
        &self.fragments
    }

    /// `PathSelector` spanning the first fragment's start to the last fragment's end.
    pub fn envelope(&self) -> Option<PathSelector> {
        let first = self.fragments.first()?;
        let last = self.fragments.last()?;
        Some(PathSelector::new(first.start.clone(), last.end.clone()))
    }
}

/// What an annotation points at.
///
/// A bare `Path` and a one-fragment `Discontinuous` are distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetSelector {
    Path(PathSelector),
    Discontinuous(DiscontinuousSelector),
}

impl TargetSelector {
    pub fn fragments(&self) -> &[PathSelector] {
        match self {
            TargetSelector::Path(path) => std::slice::from_ref(path),
            TargetSelector::Discontinuous(list) => list.fragments(),
        }
    }

    /// New target with fragment `index` replaced, keeping the variant.
    pub fn with_fragment(&self, index: usize, fragment: PathSelector) -> Option<Self> {
        match self {
            TargetSelector::Path(_) if index == 0 => Some(TargetSelector::Path(fragment)),
            TargetSelector::Path(_) => None,
            TargetSelector::Discontinuous(list) => {
                let mut fragments = list.fragments().to_vec();
                *fragments.get_mut(index)? = fragment;
                DiscontinuousSelector::from_fragments(fragments).map(TargetSelector::Discontinuous)
            }
        }
    }
}

impl From<PathSelector> for TargetSelector {
    fn from(selector: PathSelector) -> Self {
        TargetSelector::Path(selector)
    }
}

/// Append `fragment` to `current`, promoting a bare selector on the second fragment.
pub fn add_fragment(current: Option<TargetSelector>, fragment: PathSelector) -> TargetSelector {
    match current {
        None => TargetSelector::Path(fragment),
        Some(TargetSelector::Path(first)) => TargetSelector::Discontinuous(DiscontinuousSelector {
            fragments: vec![first, fragment],
        }),
        Some(TargetSelector::Discontinuous(mut list)) => {
            list.fragments.push(fragment);
            TargetSelector::Discontinuous(list)
        }
    }
}

#[derive(Serialize)]
struct ListSelectorOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    vals: &'a [PathSelector],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefinedSelectorOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    start_path: &'a Anchor,
    end_path: &'a Anchor,
    refined_by: ListSelectorOut<'a>,
}

impl Serialize for TargetSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TargetSelector::Path(path) => path.serialize(serializer),
            TargetSelector::Discontinuous(list) => {
                let (first, last) = match (list.fragments.first(), list.fragments.last()) {
                    (Some(first), Some(last)) => (first, last),
                    _ => return Err(serde::ser::Error::custom("empty discontinuous selector")),
                };
                RefinedSelectorOut {
                    kind: "PathSelector",
                    start_path: &first.start,
                    end_path: &last.end,
                    refined_by: ListSelectorOut {
                        kind: "ListSelector",
                        vals: &list.fragments,
                    },
                }
                .serialize(serializer)
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefinedSelectorIn {
    #[serde(rename = "type")]
    kind: String,
    start_path: Anchor,
    end_path: Anchor,
    refined_by: Option<ListSelectorIn>,
}

#[derive(Deserialize)]
struct ListSelectorIn {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    vals: Vec<Value>,
}

impl<'de> Deserialize<'de> for TargetSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RefinedSelectorIn::deserialize(deserializer)?;
        if wire.kind != "PathSelector" {
            return Err(D::Error::custom(format!(
                "expected a PathSelector, found {}",
                wire.kind
            )));
        }
        let bare = PathSelector::new(wire.start_path, wire.end_path);

        let Some(list) = wire.refined_by else {
            return Ok(TargetSelector::Path(bare));
        };
        if list.kind.as_deref().is_some_and(|kind| kind != "ListSelector") {
            warn!("ignoring refinement of unsupported type {:?}", list.kind);
            return Ok(TargetSelector::Path(bare));
        }

        let mut fragments = Vec::new();
        for value in list.vals {
            if value.get("type").and_then(Value::as_str) != Some("PathSelector") {
                warn!("list selector entries must be PathSelectors; skipping {value}");
                continue;
            }
            fragments.push(serde_json::from_value::<PathSelector>(value).map_err(D::Error::custom)?);
        }
        Ok(match DiscontinuousSelector::from_fragments(fragments) {
            Some(list) => TargetSelector::Discontinuous(list),
            None => {
                warn!("list selector had no usable fragments; keeping the outer range");
                TargetSelector::Path(bare)
            }
        })
    }
}

/// Character offsets into the source text. Carried through import and
/// export; the engine never resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "OffsetSelector")]
pub struct OffsetSelector {
    #[serde(alias = "startPath")]
    pub start: usize,
    #[serde(alias = "endPath")]
    pub end: usize,
}

/// One entry of a fragment target's `selector` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Path(TargetSelector),
    Offset(OffsetSelector),
}

impl Selector {
    /// Read one selector entry; `Ok(None)` for types this engine does not know.
    pub fn from_json(value: Value) -> Result<Option<Self>, serde_json::Error> {
        match value.get("type").and_then(Value::as_str) {
            Some("PathSelector") => Ok(Some(Selector::Path(serde_json::from_value(value)?))),
            Some("OffsetSelector") => Ok(Some(Selector::Offset(serde_json::from_value(value)?))),
            other => {
                warn!("selector of type {other:?} is not supported; ignoring it");
                Ok(None)
            }
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selector::Path(target) => target.serialize(serializer),
            Selector::Offset(offset) => offset.serialize(serializer),
        }
    }
}
