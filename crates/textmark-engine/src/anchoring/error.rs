/// Failures while parsing, encoding or resolving anchors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    #[error("Unsupported anchor prefix: {0}")]
    UnsupportedAnchorPrefix(String),
    #[error("Malformed anchor {anchor}: {reason}")]
    MalformedAnchor { anchor: String, reason: String },
    /// A path segment no longer matches any node; the tree drifted since encoding.
    #[error("Could not resolve segment {segment} of path {path}")]
    AnchorResolution { path: String, segment: String },
    /// The node exists but its shape is incompatible with the stored offset.
    #[error("Structural drift at {path}: {reason}")]
    StructuralDrift { path: String, reason: String },
    #[error("Boundary node is not attached to the document")]
    DetachedBoundary,
}

impl AnchorError {
    pub(crate) fn malformed(anchor: &str, reason: impl Into<String>) -> Self {
        Self::MalformedAnchor {
            anchor: anchor.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn drift(path: impl ToString, reason: impl Into<String>) -> Self {
        Self::StructuralDrift {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
