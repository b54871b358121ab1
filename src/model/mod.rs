//! Data models for the viewer annotation core.

mod annotation;
mod segmentation;
mod tool;
mod viewport;

pub use annotation::{
    Annotation, AnnotationSnapshot, AnnotationStatus, AnnotationUid, ContextKey, Origin,
    PersistedId, can_change_to_draft,
};
pub use segmentation::{LabelSlice, SegmentationId, SegmentationLayer, SegmentationSnapshot};
pub use tool::{
    AUX_WHEEL_NAVIGATE, AUX_WHEEL_ROTATE, PointerBinding, ToolCategory, ToolGroupId, ToolSelection,
};
pub use viewport::{Readiness, RenderingEngineId, Viewport, ViewportId};
