//! Command and notification types for the upstream UI.
//!
//! The hosting viewer drives the core with `UiCommand`s and drains
//! `Notification`s after each dispatch; both are plain enums so the UI layer
//! can route them without knowing the core's internals.

use crate::model::{
    AnnotationStatus, AnnotationUid, ContextKey, PersistedId, SegmentationId, ToolGroupId,
    ToolSelection, ViewportId,
};

/// Commands accepted from the upstream UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Select a tool for a tool group
    SelectTool {
        /// Target tool group
        group: ToolGroupId,
        /// Requested tool
        selection: ToolSelection,
    },
    /// Select one annotation (deselects all others)
    SelectAnnotation(AnnotationUid),
    /// Clear the annotation selection
    DeselectAnnotation,
    /// Change an annotation's display color
    Recolor {
        /// Target annotation
        uid: AnnotationUid,
        /// New color, e.g. "#FF0000"
        color: String,
    },
    /// Lock or unlock an annotation
    SetLocked {
        /// Target annotation
        uid: AnnotationUid,
        /// New lock state
        locked: bool,
    },
    /// Attach or replace an annotation's free-text note
    SetFreeText {
        /// Target annotation
        uid: AnnotationUid,
        /// The note text
        text: String,
    },
    /// Delete an annotation
    DeleteAnnotation(AnnotationUid),
    /// Move an annotation's review status forward
    ChangeStatus {
        /// Target annotation
        uid: AnnotationUid,
        /// Requested status
        status: AnnotationStatus,
    },
    /// Persist a locally drawn annotation to the backend
    SaveDraft(AnnotationUid),
    /// Undo the last step on a viewport
    Undo(ViewportId),
    /// Redo the last undone step on a viewport
    Redo(ViewportId),
    /// Re-run the merge of persisted and local annotations
    Refresh,
    /// Switch the selected display context
    SetContext(ContextKey),
    /// Switch the visible segmentation layer (no history entry)
    SetActiveLayer(SegmentationId),
}

/// Notifications surfaced to the upstream UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The selected annotation vanished from a merge; selection cleared
    Deselected {
        /// The id that went stale
        uid: AnnotationUid,
    },
    /// Engine events arrived while not refreshing; a new merge is worth pulling
    UpdatesAvailable,
    /// The persistent active tool of a group changed
    ToolChanged {
        /// The tool group
        group: ToolGroupId,
        /// The now-active tool
        selection: ToolSelection,
    },
    /// A one-shot action ran; the previous tool is still selected
    ToolActionExecuted {
        /// The tool group
        group: ToolGroupId,
        /// Name of the executed action
        action: String,
    },
    /// Segmentation tool activation was skipped for lack of a target
    ToolActivationSkipped {
        /// The tool group
        group: ToolGroupId,
        /// The tool that was not activated
        tool: String,
    },
    /// A style push never found its annotation in the engine
    StyleSyncFailed {
        /// The annotation that stayed unreachable
        uid: AnnotationUid,
    },
    /// A draft annotation was persisted
    DraftSaved {
        /// Engine-side id
        uid: AnnotationUid,
        /// Backend-assigned id
        persisted_id: PersistedId,
    },
}
