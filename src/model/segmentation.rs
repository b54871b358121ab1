//! Segmentation layer and labelmap snapshot types.

use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use super::annotation::{AnnotationStatus, Origin, PersistedId};

/// Identifier of one segmentation (labelmap volume) in the engine.
pub type SegmentationId = String;

/// Per-slice label values for one labelmap slice.
pub type LabelSlice = Vec<u16>;

/// Immutable capture of one labelmap state at one point in time.
///
/// Used purely for undo/redo/restore; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationSnapshot {
    /// The segmentation this snapshot belongs to.
    pub segmentation_id: SegmentationId,
    /// Ordered per-slice label buffers.
    pub slices: Vec<LabelSlice>,
    /// Capture time, milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
}

impl SegmentationSnapshot {
    /// Capture the given labelmap state now.
    pub fn capture(segmentation_id: impl Into<SegmentationId>, slices: Vec<LabelSlice>) -> Self {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            segmentation_id: segmentation_id.into(),
            slices,
            captured_at_ms,
        }
    }
}

/// A named segmentation layer: a labelmap plus its lifecycle metadata.
///
/// Lifecycle mirrors annotations: created on first paint or on fetch,
/// mutated on edits, removed on delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationLayer {
    /// Layer (segmentation) identifier.
    pub id: SegmentationId,
    /// Backend identifier, present only once saved.
    pub persisted_id: Option<PersistedId>,
    /// Local or Persisted, fixed at creation.
    pub origin: Origin,
    /// Display name.
    pub name: String,
    /// Whether the layer is currently shown.
    pub visible: bool,
    /// Review status, same monotonic progression as annotations.
    pub status: AnnotationStatus,
}

impl SegmentationLayer {
    /// Create a Local layer on first paint.
    pub fn local(id: impl Into<SegmentationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            persisted_id: None,
            origin: Origin::Local,
            name: name.into(),
            visible: true,
            status: AnnotationStatus::Draft,
        }
    }

    /// Whether delete/recolor style mutations are permitted for this layer.
    pub fn is_mutable(&self) -> bool {
        match self.origin {
            Origin::Local => true,
            Origin::Persisted => self.status.is_mutable(),
        }
    }
}
