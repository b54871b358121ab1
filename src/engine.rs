//! Rendering engine collaborator boundary.
//!
//! The pixel decoding / GPU rendering engine lives outside this core. It is
//! injected as a trait object so every component takes it as a dependency
//! and tests can substitute a fake. The engine's global annotation and
//! segmentation stores are a shared resource synchronized one-way on
//! command; the engine never mutates this core's state directly.

use crate::model::{
    AnnotationSnapshot, AnnotationUid, LabelSlice, PersistedId, PointerBinding, SegmentationId,
    ToolGroupId, ViewportId,
};

/// Lifecycle notifications emitted by the rendering engine.
///
/// Events for a given annotation id arrive strictly in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A drawing was completed on a viewport.
    AnnotationCompleted {
        /// Viewport the drawing happened on
        viewport: ViewportId,
        /// Engine-side state of the new annotation
        snapshot: AnnotationSnapshot,
    },
    /// An existing annotation was modified.
    AnnotationModified {
        /// Viewport the edit happened on
        viewport: ViewportId,
        /// Engine-side state after the edit
        snapshot: AnnotationSnapshot,
    },
    /// An annotation was removed from the engine store.
    AnnotationRemoved {
        /// Viewport the annotation belonged to
        viewport: ViewportId,
        /// Id of the removed annotation
        uid: AnnotationUid,
    },
    /// The engine confirmed an image is loaded and the surface can render.
    SurfaceReady {
        /// The viewport that became renderable
        viewport: ViewportId,
    },
    /// The engine failed to bring up a surface.
    SurfaceError {
        /// The viewport that failed
        viewport: ViewportId,
        /// Engine-provided detail
        message: String,
    },
}

/// Capability set of the rendering engine consumed by this core.
///
/// Lookup-style mutators (`set_selected`, `set_color`, `set_locked`) return
/// `false` when the target annotation is not registered yet; callers retry
/// within bounds instead of treating that as fatal.
pub trait RenderingEngine {
    /// All annotations in the engine's global store.
    fn all_annotations(&self) -> Vec<AnnotationSnapshot>;

    /// Annotations currently attached to one surface.
    fn annotations_for_surface(&self, surface: &ViewportId) -> Vec<AnnotationSnapshot>;

    /// Annotations of one tool kind on one surface.
    fn annotations_for_tool(&self, tool: &str, surface: &ViewportId) -> Vec<AnnotationSnapshot>;

    /// Insert an annotation snapshot into the store, attached to a surface.
    fn add_annotation(&mut self, snapshot: AnnotationSnapshot, surface: &ViewportId);

    /// Remove an annotation. Returns false if it was not present.
    fn remove_annotation(&mut self, uid: &AnnotationUid) -> bool;

    /// Stamp an annotation's metadata with its backend id once persisted.
    /// Later events for it classify as backend-origin. Returns false if
    /// the annotation is absent.
    fn set_persisted_marker(&mut self, uid: &AnnotationUid, persisted_id: &PersistedId) -> bool;

    /// Set or clear the selection highlight. Returns false if absent.
    fn set_selected(&mut self, uid: &AnnotationUid, selected: bool) -> bool;

    /// Apply a color to an annotation's style. Returns false if absent.
    fn set_color(&mut self, uid: &AnnotationUid, color: &str) -> bool;

    /// Lock or unlock an annotation. Returns false if absent.
    fn set_locked(&mut self, uid: &AnnotationUid, locked: bool) -> bool;

    /// Request a re-render of one surface.
    fn render(&mut self, surface: &ViewportId);

    /// Set a tool passive on every viewport of a group.
    fn set_tool_passive(&mut self, group: &ToolGroupId, tool: &str);

    /// Bind a tool to a pointer slot on every viewport of a group.
    fn set_tool_active(&mut self, group: &ToolGroupId, tool: &str, binding: PointerBinding);

    /// Attach a segmentation representation to a surface.
    fn add_representation(&mut self, surface: &ViewportId, segmentation: &SegmentationId);

    /// Detach a segmentation representation from a surface.
    fn remove_representation(&mut self, surface: &ViewportId, segmentation: &SegmentationId);

    /// Bind the segmentation that labelmap tools of a group paint into.
    fn set_active_segmentation(&mut self, group: &ToolGroupId, segmentation: &SegmentationId);

    /// Select the active segment index within a segmentation.
    fn set_active_segment(&mut self, segmentation: &SegmentationId, segment: u16);

    /// Read the current labelmap state of a segmentation.
    fn labelmap(&self, segmentation: &SegmentationId) -> Option<Vec<LabelSlice>>;

    /// Overwrite the labelmap state of a segmentation.
    fn write_labelmap(&mut self, segmentation: &SegmentationId, slices: Vec<LabelSlice>);

    /// Clear a segmentation's labelmap entirely.
    fn clear_labelmap(&mut self, segmentation: &SegmentationId);
}
