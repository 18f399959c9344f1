pub mod anchoring;
pub mod markup;
pub mod profile;
pub mod registry;
pub mod tree;

// Re-export key types for easier usage
pub use anchoring::{
    Anchor, AnchorError, Boundary, Direction, Endpoint, LiveRange, PathSelector, TargetSelector,
};
pub use profile::DocumentProfile;
pub use registry::{AnnotationId, AnnotationRegistry, FragmentTarget, InteractionMode, LoadReport};
pub use tree::{Document, DocumentTree, NodeId};
