use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::anchoring::{Selector, TargetSelector};

/// Opaque annotation identity shared with collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AnnotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted form of an annotation's target.
///
/// ```json
/// { "type": "FragmentTarget", "id": "…", "source": "paper.html",
///   "selector": [ { "type": "PathSelector", … }, { "type": "OffsetSelector", … } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "FragmentTarget")]
pub struct FragmentTarget {
    pub id: AnnotationId,
    pub source: String,
    pub selector: Vec<Selector>,
}

impl FragmentTarget {
    pub fn new(id: AnnotationId, source: impl Into<String>, target: TargetSelector) -> Self {
        Self {
            id,
            source: source.into(),
            selector: vec![Selector::Path(target)],
        }
    }

    /// The path-based target; the one the engine renders.
    pub fn path_selector(&self) -> Option<&TargetSelector> {
        self.selector.iter().find_map(|selector| match selector {
            Selector::Path(target) => Some(target),
            Selector::Offset(_) => None,
        })
    }

    /// Copy with the path-based target replaced; other selectors are kept.
    pub fn with_path_selector(&self, target: TargetSelector) -> Self {
        let mut selector: Vec<Selector> = Vec::with_capacity(self.selector.len() + 1);
        let mut replaced = false;
        for entry in &self.selector {
            match entry {
                Selector::Path(_) if !replaced => {
                    selector.push(Selector::Path(target.clone()));
                    replaced = true;
                }
                Selector::Path(_) => {}
                other => selector.push(other.clone()),
            }
        }
        if !replaced {
            selector.insert(0, Selector::Path(target));
        }
        Self {
            id: self.id.clone(),
            source: self.source.clone(),
            selector,
        }
    }
}

#[derive(Deserialize)]
struct FragmentTargetIn {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    id: AnnotationId,
    source: String,
    selector: Vec<Value>,
}

impl<'de> Deserialize<'de> for FragmentTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = FragmentTargetIn::deserialize(deserializer)?;
        if let Some(kind) = &wire.kind
            && !kind.eq_ignore_ascii_case("FragmentTarget")
        {
            return Err(D::Error::custom(format!("expected a FragmentTarget, found {kind}")));
        }
        let mut selector = Vec::with_capacity(wire.selector.len());
        for value in wire.selector {
            if let Some(entry) = Selector::from_json(value).map_err(D::Error::custom)? {
                selector.push(entry);
            }
        }
        Ok(Self {
            id: wire.id,
            source: wire.source,
            selector,
        })
    }
}
