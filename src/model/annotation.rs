//! Annotation data model.
//!
//! Annotations are user-visible graphical markings on a viewport. The
//! geometric/measurement payload is opaque to this core and carried as JSON;
//! the core only reasons about identity, origin, status and style.

use serde::{Deserialize, Serialize};

/// Engine-assigned identifier, stable for the in-memory lifetime of a drawing.
pub type AnnotationUid = String;

/// Backend-assigned identifier, present only once an annotation is saved.
pub type PersistedId = String;

/// Key identifying one display context (study/series selection) on the backend.
pub type ContextKey = String;

/// Where an annotation (or segmentation layer) came from.
///
/// Set exactly once at creation time: `Persisted` on fetch or on save
/// confirmation, `Local` on the first completed drawing. Never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Drawn in this session, not confirmed by the backend.
    Local,
    /// Fetched from or confirmed by backend storage.
    Persisted,
}

/// Review status of an annotation or segmentation layer.
///
/// Statuses only ever move forward: Draft -> Final -> Reviewed. The derived
/// `Ord` follows that progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationStatus {
    /// Newly drawn or saved but not finalized; fully mutable.
    #[default]
    Draft,
    /// Finalized by the operator; immutable for color/lock/delete.
    Final,
    /// Signed off by a reviewer; immutable for color/lock/delete.
    Reviewed,
}

impl AnnotationStatus {
    /// Display name for UI consumption.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationStatus::Draft => "Draft",
            AnnotationStatus::Final => "Final",
            AnnotationStatus::Reviewed => "Reviewed",
        }
    }

    /// Whether a transition to `target` keeps the status monotonic.
    pub fn can_transition_to(&self, target: AnnotationStatus) -> bool {
        target > *self
    }

    /// Mutations reserved for drafts (recolor, lock, delete) are allowed.
    pub fn is_mutable(&self) -> bool {
        matches!(self, AnnotationStatus::Draft)
    }
}

/// Reserved backward path: changing a status back to Draft is wired through
/// the command surface but its enabling condition never triggers. Kept as an
/// intentional guard, not re-enabled.
pub fn can_change_to_draft() -> bool {
    false
}

/// The engine-side state of one annotation: identity, tool, payload and the
/// optional backend-origin marker.
///
/// This is what the rendering engine stores per drawing, what lifecycle
/// events carry, and what history entries snapshot for undo/redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSnapshot {
    /// Engine-assigned identifier.
    pub uid: AnnotationUid,
    /// Name of the tool that produced the drawing ("Length", "Bidirectional", ...).
    pub tool_kind: String,
    /// Opaque geometric/measurement payload.
    pub payload: serde_json::Value,
    /// Explicit backend-origin marker. `Some` iff the annotation was
    /// hydrated from backend storage.
    pub persisted_id: Option<PersistedId>,
}

impl AnnotationSnapshot {
    /// Create a snapshot for a locally drawn annotation.
    pub fn local(
        uid: impl Into<AnnotationUid>,
        tool_kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            uid: uid.into(),
            tool_kind: tool_kind.into(),
            payload,
            persisted_id: None,
        }
    }

    /// Classify by the explicit origin marker.
    pub fn origin(&self) -> Origin {
        if self.persisted_id.is_some() {
            Origin::Persisted
        } else {
            Origin::Local
        }
    }
}

/// A fully resolved annotation as it appears in the merged display list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Engine-assigned identifier.
    pub uid: AnnotationUid,
    /// Backend identifier, present only once saved.
    pub persisted_id: Option<PersistedId>,
    /// Local or Persisted, fixed at creation.
    pub origin: Origin,
    /// Name of the producing tool.
    pub tool_kind: String,
    /// Opaque geometric/measurement payload.
    pub payload: serde_json::Value,
    /// UI-requested color, held outside the engine's own style store.
    pub color_override: Option<String>,
    /// Whether the annotation is locked against interactive edits.
    pub locked: bool,
    /// Review status. Local annotations are implicitly Draft until saved.
    pub status: AnnotationStatus,
    /// Free-text note attached by the operator.
    pub free_text: Option<String>,
}

impl Annotation {
    /// Build a Local (implicitly Draft) annotation from an engine snapshot.
    pub fn from_local_snapshot(snapshot: &AnnotationSnapshot) -> Self {
        Self {
            uid: snapshot.uid.clone(),
            persisted_id: None,
            origin: Origin::Local,
            tool_kind: snapshot.tool_kind.clone(),
            payload: snapshot.payload.clone(),
            color_override: None,
            locked: false,
            status: AnnotationStatus::Draft,
            free_text: None,
        }
    }

    /// Whether recolor, lock-toggle and delete are permitted.
    ///
    /// Local (Draft) annotations are unconditionally mutable; Persisted
    /// annotations only while their status is Draft.
    pub fn is_mutable(&self) -> bool {
        match self.origin {
            Origin::Local => true,
            Origin::Persisted => self.status.is_mutable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_monotonic_transitions() {
        use AnnotationStatus::*;
        assert!(Draft.can_transition_to(Final));
        assert!(Draft.can_transition_to(Reviewed));
        assert!(Final.can_transition_to(Reviewed));
        assert!(!Final.can_transition_to(Draft));
        assert!(!Reviewed.can_transition_to(Final));
        assert!(!Reviewed.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Draft));
    }

    #[test]
    fn test_change_to_draft_stays_disabled() {
        assert!(!can_change_to_draft());
    }

    #[test]
    fn test_origin_from_marker() {
        let local = AnnotationSnapshot::local("a1", "Length", json!({"points": [[0, 0], [1, 1]]}));
        assert_eq!(local.origin(), Origin::Local);

        let persisted = AnnotationSnapshot {
            persisted_id: Some("db-7".into()),
            ..local
        };
        assert_eq!(persisted.origin(), Origin::Persisted);
    }

    #[test]
    fn test_mutability_by_origin_and_status() {
        let snap = AnnotationSnapshot::local("a1", "Length", json!({}));
        let mut ann = Annotation::from_local_snapshot(&snap);
        assert!(ann.is_mutable());

        ann.origin = Origin::Persisted;
        ann.status = AnnotationStatus::Final;
        assert!(!ann.is_mutable());
        ann.status = AnnotationStatus::Reviewed;
        assert!(!ann.is_mutable());
        ann.status = AnnotationStatus::Draft;
        assert!(ann.is_mutable());
    }
}
