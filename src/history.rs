//! Undo/redo history for locally drawn annotations and segmentation edits.
//!
//! Each undoable step is a record that knows how to reverse and re-apply
//! itself against the rendering engine. Stacks are kept per viewport and are
//! fully independent: undoing in one pane never touches another pane's
//! stack. Only Local-origin annotations ever enter history; Persisted
//! annotations are not undoable through this path.

use std::collections::{HashMap, HashSet};

use crate::engine::RenderingEngine;
use crate::model::{
    AnnotationSnapshot, AnnotationUid, Origin, SegmentationId, SegmentationSnapshot, ViewportId,
};

// ============================================================================
// History Records
// ============================================================================

/// One undoable/redoable step.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryRecord {
    /// A locally drawn annotation was created or last modified.
    Annotation {
        /// Engine-assigned id of the drawing
        uid: AnnotationUid,
        /// Tool that produced it
        tool_kind: String,
        /// Latest engine-side state, used by redo
        snapshot: AnnotationSnapshot,
        /// State before the latest modification, if any
        previous: Option<AnnotationSnapshot>,
    },
    /// A segmentation labelmap was edited.
    Segmentation {
        /// The edited segmentation
        segmentation: SegmentationId,
        /// Labelmap state after the edit, used by redo
        snapshot: SegmentationSnapshot,
        /// Labelmap state before the edit; `None` when the edit created
        /// the segmentation
        previous: Option<SegmentationSnapshot>,
    },
}

impl HistoryRecord {
    /// Human-readable description of this step.
    pub fn description(&self) -> String {
        match self {
            HistoryRecord::Annotation { tool_kind, previous, .. } => {
                if previous.is_some() {
                    format!("Modify {tool_kind} annotation")
                } else {
                    format!("Draw {tool_kind} annotation")
                }
            }
            HistoryRecord::Segmentation { segmentation, .. } => {
                format!("Edit segmentation '{segmentation}'")
            }
        }
    }
}

/// A record bound to the viewport it happened on.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Owning viewport.
    pub viewport: ViewportId,
    /// The undoable step.
    pub record: HistoryRecord,
}

// ============================================================================
// Per-Viewport Stack
// ============================================================================

/// Undo/redo stacks for one viewport, most recent at the end.
///
/// Pushing a new entry clears the redo stack; history length is bounded by
/// dropping the oldest entries.
#[derive(Debug, Default)]
pub struct ViewportHistory {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_history: usize,
}

impl ViewportHistory {
    fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Push a new entry, clearing the redo stack.
    fn push(&mut self, entry: HistoryEntry) {
        log::debug!("History: pushed '{}'", entry.record.description());
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of entries on the undo stack.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of entries on the redo stack.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the step undo would take next.
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(|e| e.record.description())
    }

    /// Description of the step redo would take next.
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|e| e.record.description())
    }

    /// Update the latest annotation record for `uid` with a modified
    /// snapshot, keeping the prior state for one-step undo. Returns false
    /// if no record for `uid` exists.
    fn update_annotation(&mut self, uid: &AnnotationUid, new_snapshot: AnnotationSnapshot) -> bool {
        for entry in self.undo_stack.iter_mut().rev() {
            if let HistoryRecord::Annotation { uid: entry_uid, snapshot, previous, .. } =
                &mut entry.record
                && entry_uid == uid
            {
                *previous = Some(snapshot.clone());
                *snapshot = new_snapshot;
                return true;
            }
        }
        false
    }

    /// Drop every record for `uid` from both stacks.
    fn purge_annotation(&mut self, uid: &AnnotationUid) {
        let matches = |entry: &HistoryEntry| {
            matches!(&entry.record, HistoryRecord::Annotation { uid: u, .. } if u == uid)
        };
        self.undo_stack.retain(|e| !matches(e));
        self.redo_stack.retain(|e| !matches(e));
    }
}

// ============================================================================
// History Manager
// ============================================================================

/// Per-viewport undo/redo stacks plus the pending-undo markers that keep an
/// in-progress undo from deleting the entry it is consuming.
#[derive(Debug)]
pub struct HistoryManager {
    stacks: HashMap<ViewportId, ViewportHistory>,
    pending_undo: HashSet<AnnotationUid>,
    max_history: usize,
}

impl HistoryManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            stacks: HashMap::new(),
            pending_undo: HashSet::new(),
            max_history,
        }
    }

    /// The stack for one viewport, if it has any history.
    pub fn stack(&self, viewport: &ViewportId) -> Option<&ViewportHistory> {
        self.stacks.get(viewport)
    }

    fn stack_mut(&mut self, viewport: &ViewportId) -> &mut ViewportHistory {
        self.stacks
            .entry(viewport.clone())
            .or_insert_with(|| ViewportHistory::new(self.max_history))
    }

    /// Record a completed local drawing.
    ///
    /// Persisted-origin snapshots never enter history; callers classify
    /// before recording, and this rejects them again by marker.
    pub fn record_completed(&mut self, viewport: &ViewportId, snapshot: AnnotationSnapshot) {
        if snapshot.origin() == Origin::Persisted {
            log::warn!(
                "Refusing history entry for persisted annotation '{}'",
                snapshot.uid
            );
            return;
        }
        let record = HistoryRecord::Annotation {
            uid: snapshot.uid.clone(),
            tool_kind: snapshot.tool_kind.clone(),
            snapshot,
            previous: None,
        };
        self.stack_mut(viewport).push(HistoryEntry {
            viewport: viewport.clone(),
            record,
        });
    }

    /// Update the history entry for a modified local drawing, keeping the
    /// prior snapshot for one-step undo. Creates the entry if the creation
    /// event was missed.
    pub fn record_modified(&mut self, viewport: &ViewportId, snapshot: AnnotationSnapshot) {
        if snapshot.origin() == Origin::Persisted {
            return;
        }
        let uid = snapshot.uid.clone();
        if !self.stack_mut(viewport).update_annotation(&uid, snapshot.clone()) {
            self.record_completed(viewport, snapshot);
        }
    }

    /// Record a segmentation labelmap edit.
    pub fn record_segmentation_edit(
        &mut self,
        viewport: &ViewportId,
        segmentation: &SegmentationId,
        snapshot: SegmentationSnapshot,
        previous: Option<SegmentationSnapshot>,
    ) {
        let record = HistoryRecord::Segmentation {
            segmentation: segmentation.clone(),
            snapshot,
            previous,
        };
        self.stack_mut(viewport).push(HistoryEntry {
            viewport: viewport.clone(),
            record,
        });
    }

    /// Drop history entries for an annotation removed through a non-undo
    /// path. A pending-undo marker consumes the removal instead, preserving
    /// the entry the in-progress undo owns.
    pub fn on_annotation_removed(&mut self, viewport: &ViewportId, uid: &AnnotationUid) {
        if self.pending_undo.remove(uid) {
            log::debug!("Removal of '{uid}' consumed by in-progress undo");
            return;
        }
        if let Some(stack) = self.stacks.get_mut(viewport) {
            stack.purge_annotation(uid);
        }
    }

    /// Whether an undo is currently consuming the removal of `uid`.
    pub fn is_pending_undo(&self, uid: &AnnotationUid) -> bool {
        self.pending_undo.contains(uid)
    }

    /// Drop every entry for an annotation from every stack. Called when a
    /// draft is persisted and leaves undo reach; a leftover entry would
    /// block the steps below it.
    pub fn forget_annotation(&mut self, uid: &AnnotationUid) {
        self.pending_undo.remove(uid);
        for stack in self.stacks.values_mut() {
            stack.purge_annotation(uid);
        }
    }

    /// Undo one step on a viewport. Returns true if a step was taken.
    pub fn undo(&mut self, viewport: &ViewportId, engine: &mut dyn RenderingEngine) -> bool {
        let Some(stack) = self.stacks.get_mut(viewport) else {
            return false;
        };
        let Some(entry) = stack.undo_stack.pop() else {
            return false;
        };

        match &entry.record {
            HistoryRecord::Annotation { uid, .. } => {
                let live = engine.all_annotations().into_iter().find(|s| &s.uid == uid);
                // Absent or persisted-origin drawings are not undoable here.
                let actionable = match live {
                    None => {
                        log::debug!("Undo no-op: '{uid}' not in engine");
                        false
                    }
                    Some(live) if live.origin() == Origin::Persisted => {
                        log::debug!("Undo no-op: '{uid}' is persisted");
                        false
                    }
                    Some(_) => true,
                };
                if !actionable {
                    stack.undo_stack.push(entry);
                    return false;
                }
                let uid = uid.clone();
                log::debug!("Undo: '{}'", entry.record.description());
                stack.redo_stack.push(entry);
                self.pending_undo.insert(uid.clone());
                engine.remove_annotation(&uid);
                engine.render(viewport);
                true
            }
            HistoryRecord::Segmentation { segmentation, previous, .. } => {
                let segmentation = segmentation.clone();
                let previous = previous.clone();
                log::debug!("Undo: '{}'", entry.record.description());
                stack.redo_stack.push(entry);
                match previous {
                    Some(prior) => engine.write_labelmap(&segmentation, prior.slices),
                    // The edit created the segmentation; undo clears it.
                    None => engine.clear_labelmap(&segmentation),
                }
                // Segmentation edits are not broadcast cross-viewport.
                engine.render(viewport);
                true
            }
        }
    }

    /// Redo one step on a viewport. Returns true if a step was taken.
    pub fn redo(&mut self, viewport: &ViewportId, engine: &mut dyn RenderingEngine) -> bool {
        let Some(stack) = self.stacks.get_mut(viewport) else {
            return false;
        };
        let Some(entry) = stack.redo_stack.pop() else {
            return false;
        };

        match &entry.record {
            HistoryRecord::Annotation { uid, snapshot, .. } => {
                if engine.all_annotations().iter().any(|s| &s.uid == uid) {
                    log::debug!("Redo no-op: '{uid}' already present");
                    stack.redo_stack.push(entry);
                    return false;
                }
                let snapshot = snapshot.clone();
                log::debug!("Redo: '{}'", entry.record.description());
                stack.undo_stack.push(entry);
                engine.add_annotation(snapshot, viewport);
                engine.render(viewport);
                true
            }
            HistoryRecord::Segmentation { segmentation, snapshot, .. } => {
                let segmentation = segmentation.clone();
                let slices = snapshot.slices.clone();
                log::debug!("Redo: '{}'", entry.record.description());
                stack.undo_stack.push(entry);
                engine.write_labelmap(&segmentation, slices);
                engine.render(viewport);
                true
            }
        }
    }

    /// Drop all history for an unmounted viewport.
    pub fn drop_viewport(&mut self, viewport: &ViewportId) {
        if self.stacks.remove(viewport).is_some() {
            log::debug!("History for viewport '{viewport}' dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
