//! Reconciliation of persisted and locally drawn annotations.
//!
//! Each refresh merges the backend's persisted annotations for the selected
//! display context with the local drawings collected from every viewport
//! showing that context, into one permission-annotated display list. User
//! commands (select, recolor, lock, delete, status change, save-draft) are
//! validated against the status-based mutability policy here before any
//! engine or backend call is attempted.
//!
//! The merge is safe to re-run at any time: it only ever replaces the
//! Persisted sub-list, never the Local one, so optimistic local edits
//! survive a concurrent refresh.

use std::collections::HashMap;

use web_time::Instant;

use crate::backend::{AnnotationBackend, AnnotationUpdate, PersistedAnnotation};
use crate::engine::RenderingEngine;
use crate::error::CoreError;
use crate::history::HistoryManager;
use crate::message::Notification;
use crate::model::{
    Annotation, AnnotationSnapshot, AnnotationStatus, AnnotationUid, ContextKey, Origin,
    PersistedId, can_change_to_draft,
};
use crate::registry::ViewportRegistry;
use crate::style::StyleStore;

/// One merged-list entry, annotated with what the UI may do to it.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayAnnotation {
    /// The resolved annotation.
    pub annotation: Annotation,
    /// Recolor, lock-toggle and delete are permitted.
    pub can_edit: bool,
    /// Draft -> Final is available.
    pub can_finalize: bool,
    /// Final -> Reviewed is available (reviewer capability required).
    pub can_review: bool,
    /// Reserved backward path; never enabled.
    pub can_change_to_draft: bool,
    /// Whether this is the selected annotation.
    pub selected: bool,
}

/// Merges annotation populations and enforces the mutability policy.
#[derive(Debug)]
pub struct Reconciler {
    context: ContextKey,
    /// Persisted sub-list from the last non-stale fetch.
    persisted: Vec<Annotation>,
    /// Local sub-list from the last collection pass.
    local: Vec<Annotation>,
    selected: Option<AnnotationUid>,
    dirty: bool,
    /// Engine uid of drafts saved this session, keyed by backend id, so a
    /// later fetch does not present them under a new identity.
    saved: HashMap<PersistedId, AnnotationUid>,
    /// Reviewer capability of the session operator.
    reviewer: bool,
}

impl Reconciler {
    pub fn new(context: impl Into<ContextKey>, reviewer: bool) -> Self {
        Self {
            context: context.into(),
            persisted: Vec::new(),
            local: Vec::new(),
            selected: None,
            dirty: true,
            saved: HashMap::new(),
            reviewer,
        }
    }

    /// The selected display context.
    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    /// Switch the display context. The next refresh repopulates the
    /// persisted sub-list; responses for the old context are discarded.
    pub fn set_context(&mut self, context: impl Into<ContextKey>) {
        let context = context.into();
        if context != self.context {
            log::debug!("Display context -> '{context}'");
            self.context = context;
            self.persisted.clear();
            self.local.clear();
            self.dirty = true;
        }
    }

    /// Whether engine events have arrived since the last refresh.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flip the dirty flag. Returns true when it was newly set, so the
    /// caller can emit a single updates-available notification.
    pub fn mark_dirty(&mut self) -> bool {
        let newly = !self.dirty;
        self.dirty = true;
        newly
    }

    /// The selected annotation id, if any.
    pub fn selected(&self) -> Option<&AnnotationUid> {
        self.selected.as_ref()
    }

    /// Whether the session operator holds reviewer capability.
    pub fn reviewer(&self) -> bool {
        self.reviewer
    }

    /// Re-run the merge for the current context.
    ///
    /// Idempotent: with no intervening events two runs produce an identical
    /// list. A fetch response carrying a different context key than the
    /// current one is stale and discarded without touching any state.
    pub fn refresh(
        &mut self,
        registry: &ViewportRegistry,
        engine: &dyn RenderingEngine,
        backend: &dyn AnnotationBackend,
        styles: &StyleStore,
        notifications: &mut Vec<Notification>,
    ) -> Result<(), CoreError> {
        let response = backend.list_annotations(&self.context)?;
        if response.context != self.context {
            log::debug!(
                "Discarding stale fetch for context '{}' (current '{}')",
                response.context,
                self.context
            );
            return Ok(());
        }

        self.persisted = response
            .annotations
            .iter()
            .map(|record| self.resolve_persisted(record))
            .collect();

        // Local drawings from every Ready viewport showing this context,
        // deduplicated by id. Drafts already saved this session surface
        // through the persisted sub-list instead.
        let mut local: Vec<Annotation> = Vec::new();
        for viewport in registry.ready_in_context(&self.context) {
            for snapshot in engine.annotations_for_surface(&viewport) {
                if snapshot.origin() == Origin::Persisted {
                    continue;
                }
                if self.saved.values().any(|uid| uid == &snapshot.uid) {
                    continue;
                }
                if local.iter().any(|a| a.uid == snapshot.uid) {
                    continue;
                }
                local.push(Annotation::from_local_snapshot(&snapshot));
            }
        }
        self.local = local;

        for annotation in self.persisted.iter_mut().chain(self.local.iter_mut()) {
            styles.apply(annotation);
        }

        if let Some(uid) = self.selected.clone()
            && self.find(&uid).is_none()
        {
            log::debug!("Selected annotation '{uid}' gone after merge; deselecting");
            self.selected = None;
            notifications.push(Notification::Deselected { uid });
        }

        self.dirty = false;
        Ok(())
    }

    fn resolve_persisted(&self, record: &PersistedAnnotation) -> Annotation {
        // A draft saved this session keeps its engine uid; anything else is
        // keyed by its stable backend id.
        let uid = self
            .saved
            .get(&record.id)
            .cloned()
            .unwrap_or_else(|| record.id.clone());
        Annotation {
            uid,
            persisted_id: Some(record.id.clone()),
            origin: Origin::Persisted,
            tool_kind: record.tool_kind.clone(),
            payload: record.payload.clone(),
            color_override: record.color.clone(),
            locked: record.locked,
            status: record.status,
            free_text: record.free_text.clone(),
        }
    }

    /// The merged display list: persisted first, then local drafts.
    pub fn display_list(&self) -> Vec<DisplayAnnotation> {
        self.persisted
            .iter()
            .chain(self.local.iter())
            .map(|annotation| {
                let can_edit = annotation.is_mutable();
                let can_finalize = annotation.status == AnnotationStatus::Draft;
                let can_review = self.reviewer && annotation.status == AnnotationStatus::Final;
                DisplayAnnotation {
                    can_edit,
                    can_finalize,
                    can_review,
                    can_change_to_draft: can_change_to_draft(),
                    selected: self.selected.as_ref() == Some(&annotation.uid),
                    annotation: annotation.clone(),
                }
            })
            .collect()
    }

    /// Look up a merged annotation by id.
    pub fn find(&self, uid: &AnnotationUid) -> Option<&Annotation> {
        self.persisted
            .iter()
            .chain(self.local.iter())
            .find(|a| &a.uid == uid)
    }

    fn find_mut(&mut self, uid: &AnnotationUid) -> Option<&mut Annotation> {
        self.persisted
            .iter_mut()
            .chain(self.local.iter_mut())
            .find(|a| &a.uid == uid)
    }

    fn require(&self, uid: &AnnotationUid) -> Result<&Annotation, CoreError> {
        self.find(uid)
            .ok_or_else(|| CoreError::UnknownAnnotation(uid.clone()))
    }

    fn require_mutable(&self, uid: &AnnotationUid) -> Result<&Annotation, CoreError> {
        let annotation = self.require(uid)?;
        if !annotation.is_mutable() {
            return Err(CoreError::PermissionDenied {
                uid: uid.clone(),
                status: annotation.status,
            });
        }
        Ok(annotation)
    }

    /// Select one annotation, deselecting all others first, and re-render
    /// every viewport that might display it.
    pub fn select(
        &mut self,
        uid: &AnnotationUid,
        registry: &ViewportRegistry,
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), CoreError> {
        self.require(uid)?;
        if let Some(previous) = self.selected.take()
            && previous != *uid
        {
            engine.set_selected(&previous, false);
        }
        engine.set_selected(uid, true);
        self.selected = Some(uid.clone());
        // Annotations can be visible across linked panes; render them all.
        for viewport in registry.ready_in_context(&self.context) {
            engine.render(&viewport);
        }
        Ok(())
    }

    /// Clear the selection.
    pub fn deselect(&mut self, registry: &ViewportRegistry, engine: &mut dyn RenderingEngine) {
        if let Some(previous) = self.selected.take() {
            engine.set_selected(&previous, false);
            for viewport in registry.ready_in_context(&self.context) {
                engine.render(&viewport);
            }
        }
    }

    /// Change an annotation's display color.
    ///
    /// The override store is updated optimistically and pushed to the engine
    /// with bounded retry; for persisted annotations the change is also
    /// persisted, and rolled back here if the backend rejects it.
    pub fn recolor(
        &mut self,
        uid: &AnnotationUid,
        color: &str,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        styles: &mut StyleStore,
        now: Instant,
    ) -> Result<(), CoreError> {
        let annotation = self.require_mutable(uid)?;
        let persisted_id = annotation.persisted_id.clone();

        let previous = styles.snapshot(uid);
        styles.set_color(uid, color, engine, now);

        if let Some(id) = persisted_id
            && let Err(err) = backend.update_annotation(&id, &AnnotationUpdate::color(color))
        {
            log::warn!("Recolor of '{uid}' rejected by backend; rolling back");
            styles.restore(uid, previous, engine, now);
            return Err(err.into());
        }

        if let Some(annotation) = self.find_mut(uid) {
            annotation.color_override = Some(color.to_string());
        }
        Ok(())
    }

    /// Lock or unlock an annotation, same policy and rollback as recolor.
    pub fn set_locked(
        &mut self,
        uid: &AnnotationUid,
        locked: bool,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        styles: &mut StyleStore,
        now: Instant,
    ) -> Result<(), CoreError> {
        let annotation = self.require_mutable(uid)?;
        let persisted_id = annotation.persisted_id.clone();

        let previous = styles.snapshot(uid);
        styles.set_locked(uid, locked, engine, now);

        if let Some(id) = persisted_id
            && let Err(err) = backend.update_annotation(&id, &AnnotationUpdate::locked(locked))
        {
            log::warn!("Lock change of '{uid}' rejected by backend; rolling back");
            styles.restore(uid, previous, engine, now);
            return Err(err.into());
        }

        if let Some(annotation) = self.find_mut(uid) {
            annotation.locked = locked;
        }
        Ok(())
    }

    /// Attach or replace the operator's free-text note, same mutability
    /// policy as recolor.
    pub fn set_free_text(
        &mut self,
        uid: &AnnotationUid,
        text: &str,
        backend: &mut dyn AnnotationBackend,
    ) -> Result<(), CoreError> {
        let annotation = self.require_mutable(uid)?;
        if let Some(id) = annotation.persisted_id.clone() {
            backend.update_annotation(&id, &AnnotationUpdate::free_text(text))?;
        }
        if let Some(annotation) = self.find_mut(uid) {
            annotation.free_text = Some(text.to_string());
        }
        Ok(())
    }

    /// Delete an annotation from the engine and, if persisted, the backend.
    ///
    /// A backend rejection after the engine removal cannot be rolled back
    /// meaningfully and is surfaced immediately for user-visible retry.
    pub fn delete(
        &mut self,
        uid: &AnnotationUid,
        registry: &ViewportRegistry,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        styles: &mut StyleStore,
        notifications: &mut Vec<Notification>,
    ) -> Result<(), CoreError> {
        let annotation = self.require_mutable(uid)?;
        let persisted_id = annotation.persisted_id.clone();

        engine.remove_annotation(uid);
        if let Some(id) = &persisted_id {
            backend.delete_annotation(id)?;
            self.saved.remove(id);
        }

        self.persisted.retain(|a| &a.uid != uid);
        self.local.retain(|a| &a.uid != uid);
        styles.remove(uid);
        if self.selected.as_ref() == Some(uid) {
            self.selected = None;
            notifications.push(Notification::Deselected { uid: uid.clone() });
        }
        for viewport in registry.ready_in_context(&self.context) {
            engine.render(&viewport);
        }
        log::debug!("Deleted annotation '{uid}'");
        Ok(())
    }

    /// Move an annotation's review status forward.
    ///
    /// Draft -> Final from Local or Draft-Persisted (a Local draft is saved
    /// first); Final -> Reviewed only with reviewer capability. No target
    /// ever regresses the status; on backend rejection the status is left
    /// unchanged and the failure surfaced once.
    pub fn change_status(
        &mut self,
        uid: &AnnotationUid,
        target: AnnotationStatus,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        history: &mut HistoryManager,
    ) -> Result<(), CoreError> {
        let (from, origin, existing_id) = {
            let annotation = self.require(uid)?;
            (
                annotation.status,
                annotation.origin,
                annotation.persisted_id.clone(),
            )
        };

        let allowed = match (from, target) {
            (AnnotationStatus::Draft, AnnotationStatus::Final) => true,
            (AnnotationStatus::Final, AnnotationStatus::Reviewed) => {
                if !self.reviewer {
                    return Err(CoreError::ReviewerRequired { uid: uid.clone() });
                }
                true
            }
            // The Draft target stays wired but never enabled.
            (_, AnnotationStatus::Draft) => can_change_to_draft(),
            _ => false,
        };
        if !allowed || !from.can_transition_to(target) {
            return Err(CoreError::InvalidStatusTransition {
                uid: uid.clone(),
                from,
                to: target,
            });
        }

        let persisted_id = match (origin, existing_id) {
            (Origin::Persisted, Some(id)) => id,
            // Finalizing an unsaved draft persists it first.
            _ => self.save_draft_record(uid, engine, backend, history)?,
        };

        backend.update_annotation(&persisted_id, &AnnotationUpdate::status(target))?;
        if let Some(annotation) = self.find_mut(uid) {
            annotation.status = target;
        }
        log::debug!("Annotation '{uid}' status {from:?} -> {target:?}");
        Ok(())
    }

    /// Persist a locally drawn annotation. Returns the backend id; a no-op
    /// for annotations that are already persisted.
    ///
    /// The engine copy is stamped with the backend id and the uid's history
    /// entries are dropped: a saved annotation is no longer undoable.
    pub fn save_draft(
        &mut self,
        uid: &AnnotationUid,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        history: &mut HistoryManager,
        notifications: &mut Vec<Notification>,
    ) -> Result<PersistedId, CoreError> {
        let annotation = self.require(uid)?;
        if let Some(id) = &annotation.persisted_id {
            return Ok(id.clone());
        }
        let persisted_id = self.save_draft_record(uid, engine, backend, history)?;
        notifications.push(Notification::DraftSaved {
            uid: uid.clone(),
            persisted_id: persisted_id.clone(),
        });
        Ok(persisted_id)
    }

    fn save_draft_record(
        &mut self,
        uid: &AnnotationUid,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
        history: &mut HistoryManager,
    ) -> Result<PersistedId, CoreError> {
        let annotation = self.require(uid)?;
        let draft = AnnotationSnapshot {
            uid: annotation.uid.clone(),
            tool_kind: annotation.tool_kind.clone(),
            payload: annotation.payload.clone(),
            persisted_id: None,
        };
        let persisted_id = backend.create_annotation(&self.context, &draft)?;
        self.saved.insert(persisted_id.clone(), uid.clone());

        // The draft now surfaces through the persisted sub-list.
        if let Some(position) = self.local.iter().position(|a| &a.uid == uid) {
            let mut annotation = self.local.remove(position);
            annotation.persisted_id = Some(persisted_id.clone());
            annotation.origin = Origin::Persisted;
            annotation.status = AnnotationStatus::Draft;
            self.persisted.push(annotation);
        }

        // From here the annotation is backend-origin everywhere: the live
        // engine copy carries the marker and undo can no longer reach it.
        engine.set_persisted_marker(uid, &persisted_id);
        history.forget_annotation(uid);
        log::debug!("Draft '{uid}' saved as '{persisted_id}'");
        Ok(persisted_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
