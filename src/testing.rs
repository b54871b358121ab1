//! In-memory fakes for the engine and backend collaborators.
//!
//! Shared by the unit tests across modules. The fakes mirror the observable
//! behavior the core relies on: the engine's annotation/labelmap stores and
//! tool bindings, and the backend's per-context records with injectable
//! failures and stale-context responses.

use std::collections::{BTreeSet, HashMap};

use crate::backend::{
    AnnotationBackend, AnnotationUpdate, BackendError, FetchResponse, LayerFetchResponse,
    PersistedAnnotation, PersistedLayer,
};
use crate::engine::RenderingEngine;
use crate::model::{
    AnnotationSnapshot, AnnotationUid, ContextKey, LabelSlice, PersistedId, PointerBinding,
    SegmentationId, ToolGroupId, ViewportId,
};

// ============================================================================
// Fake Rendering Engine
// ============================================================================

/// In-memory stand-in for the rendering engine.
#[derive(Debug, Default)]
pub struct FakeEngine {
    annotations: Vec<(AnnotationSnapshot, ViewportId)>,
    selected: BTreeSet<AnnotationUid>,
    colors: HashMap<AnnotationUid, String>,
    locked: BTreeSet<AnnotationUid>,
    render_counts: HashMap<ViewportId, u32>,
    active_bindings: HashMap<ToolGroupId, HashMap<PointerBinding, String>>,
    passive: HashMap<ToolGroupId, BTreeSet<String>>,
    active_segmentations: HashMap<ToolGroupId, SegmentationId>,
    active_segments: HashMap<SegmentationId, u16>,
    labelmaps: HashMap<SegmentationId, Vec<LabelSlice>>,
    representations: HashMap<ViewportId, BTreeSet<SegmentationId>>,
    /// Per-uid countdown of style lookups that report "not registered yet".
    style_delay: HashMap<AnnotationUid, u32>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` style calls for `uid` fail, simulating an
    /// annotation registered in the engine asynchronously.
    pub fn delay_style_registration(&mut self, uid: impl Into<AnnotationUid>, times: u32) {
        self.style_delay.insert(uid.into(), times);
    }

    fn style_lookup(&mut self, uid: &AnnotationUid) -> bool {
        if let Some(remaining) = self.style_delay.get_mut(uid) {
            if *remaining > 0 {
                *remaining -= 1;
                return false;
            }
        }
        self.annotations.iter().any(|(s, _)| &s.uid == uid)
    }

    /// Tool bound to a pointer slot of a group, if any.
    pub fn active_binding(&self, group: &ToolGroupId, binding: PointerBinding) -> Option<String> {
        self.active_bindings
            .get(group)
            .and_then(|b| b.get(&binding).cloned())
    }

    /// Tools set passive on a group.
    pub fn passive_tools(&self, group: &ToolGroupId) -> BTreeSet<String> {
        self.passive.get(group).cloned().unwrap_or_default()
    }

    /// Active segmentation bound to a group.
    pub fn active_segmentation(&self, group: &ToolGroupId) -> Option<SegmentationId> {
        self.active_segmentations.get(group).cloned()
    }

    /// Active segment index of a segmentation.
    pub fn active_segment(&self, segmentation: &SegmentationId) -> Option<u16> {
        self.active_segments.get(segmentation).copied()
    }

    /// Color last applied to an annotation via `set_color`.
    pub fn color_of(&self, uid: &AnnotationUid) -> Option<&String> {
        self.colors.get(uid)
    }

    /// Whether an annotation is locked in the engine.
    pub fn is_locked(&self, uid: &AnnotationUid) -> bool {
        self.locked.contains(uid)
    }

    /// Ids currently selected in the engine.
    pub fn selected_ids(&self) -> Vec<AnnotationUid> {
        self.selected.iter().cloned().collect()
    }

    /// Number of render requests issued for a surface.
    pub fn render_count(&self, surface: &ViewportId) -> u32 {
        self.render_counts.get(surface).copied().unwrap_or(0)
    }

    /// Segmentations represented on a surface.
    pub fn representations(&self, surface: &ViewportId) -> BTreeSet<SegmentationId> {
        self.representations.get(surface).cloned().unwrap_or_default()
    }
}

impl RenderingEngine for FakeEngine {
    fn all_annotations(&self) -> Vec<AnnotationSnapshot> {
        self.annotations.iter().map(|(s, _)| s.clone()).collect()
    }

    fn annotations_for_surface(&self, surface: &ViewportId) -> Vec<AnnotationSnapshot> {
        self.annotations
            .iter()
            .filter(|(_, owner)| owner == surface)
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn annotations_for_tool(&self, tool: &str, surface: &ViewportId) -> Vec<AnnotationSnapshot> {
        self.annotations
            .iter()
            .filter(|(s, owner)| owner == surface && s.tool_kind == tool)
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn add_annotation(&mut self, snapshot: AnnotationSnapshot, surface: &ViewportId) {
        self.annotations.push((snapshot, surface.clone()));
    }

    fn remove_annotation(&mut self, uid: &AnnotationUid) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|(s, _)| &s.uid != uid);
        self.selected.remove(uid);
        self.annotations.len() < before
    }

    fn set_persisted_marker(&mut self, uid: &AnnotationUid, persisted_id: &PersistedId) -> bool {
        for (snapshot, _) in self.annotations.iter_mut() {
            if &snapshot.uid == uid {
                snapshot.persisted_id = Some(persisted_id.clone());
                return true;
            }
        }
        false
    }

    fn set_selected(&mut self, uid: &AnnotationUid, selected: bool) -> bool {
        if !self.annotations.iter().any(|(s, _)| &s.uid == uid) {
            return false;
        }
        if selected {
            self.selected.insert(uid.clone());
        } else {
            self.selected.remove(uid);
        }
        true
    }

    fn set_color(&mut self, uid: &AnnotationUid, color: &str) -> bool {
        if !self.style_lookup(uid) {
            return false;
        }
        self.colors.insert(uid.clone(), color.to_string());
        true
    }

    fn set_locked(&mut self, uid: &AnnotationUid, locked: bool) -> bool {
        if !self.style_lookup(uid) {
            return false;
        }
        if locked {
            self.locked.insert(uid.clone());
        } else {
            self.locked.remove(uid);
        }
        true
    }

    fn render(&mut self, surface: &ViewportId) {
        *self.render_counts.entry(surface.clone()).or_insert(0) += 1;
    }

    fn set_tool_passive(&mut self, group: &ToolGroupId, tool: &str) {
        self.passive
            .entry(group.clone())
            .or_default()
            .insert(tool.to_string());
        if let Some(bindings) = self.active_bindings.get_mut(group) {
            bindings.retain(|_, name| name != tool);
        }
    }

    fn set_tool_active(&mut self, group: &ToolGroupId, tool: &str, binding: PointerBinding) {
        self.passive.entry(group.clone()).or_default().remove(tool);
        self.active_bindings
            .entry(group.clone())
            .or_default()
            .insert(binding, tool.to_string());
    }

    fn add_representation(&mut self, surface: &ViewportId, segmentation: &SegmentationId) {
        self.representations
            .entry(surface.clone())
            .or_default()
            .insert(segmentation.clone());
    }

    fn remove_representation(&mut self, surface: &ViewportId, segmentation: &SegmentationId) {
        if let Some(set) = self.representations.get_mut(surface) {
            set.remove(segmentation);
        }
    }

    fn set_active_segmentation(&mut self, group: &ToolGroupId, segmentation: &SegmentationId) {
        self.active_segmentations
            .insert(group.clone(), segmentation.clone());
    }

    fn set_active_segment(&mut self, segmentation: &SegmentationId, segment: u16) {
        self.active_segments.insert(segmentation.clone(), segment);
    }

    fn labelmap(&self, segmentation: &SegmentationId) -> Option<Vec<LabelSlice>> {
        self.labelmaps.get(segmentation).cloned()
    }

    fn write_labelmap(&mut self, segmentation: &SegmentationId, slices: Vec<LabelSlice>) {
        self.labelmaps.insert(segmentation.clone(), slices);
    }

    fn clear_labelmap(&mut self, segmentation: &SegmentationId) {
        self.labelmaps.remove(segmentation);
    }
}

// ============================================================================
// Fake Backend
// ============================================================================

/// In-memory stand-in for the persistence service.
#[derive(Debug, Default)]
pub struct FakeBackend {
    annotations: HashMap<PersistedId, (ContextKey, PersistedAnnotation)>,
    layers: HashMap<PersistedId, (ContextKey, PersistedLayer)>,
    next_id: u32,
    /// When set, list responses echo this context instead of the requested
    /// one, simulating a response that resolved after a context switch.
    pub respond_with_context: Option<ContextKey>,
    /// Fail the next update call with this message.
    pub fail_next_update: Option<String>,
    /// Fail the next create call with this message.
    pub fail_next_create: Option<String>,
    /// Fail the next delete call with this message.
    pub fail_next_delete: Option<String>,
    /// Number of update calls observed.
    pub update_calls: u32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> PersistedId {
        self.next_id += 1;
        format!("db-{}", self.next_id)
    }

    /// Seed a persisted annotation into a context, returning its id.
    pub fn seed_annotation(
        &mut self,
        context: impl Into<ContextKey>,
        mut record: PersistedAnnotation,
    ) -> PersistedId {
        if record.id.is_empty() {
            record.id = self.fresh_id();
        }
        let id = record.id.clone();
        self.annotations.insert(id.clone(), (context.into(), record));
        id
    }

    /// Seed a persisted segmentation layer into a context.
    pub fn seed_layer(
        &mut self,
        context: impl Into<ContextKey>,
        record: PersistedLayer,
    ) -> PersistedId {
        let id = record.id.clone();
        self.layers.insert(id.clone(), (context.into(), record));
        id
    }

    /// Stored record for a persisted annotation.
    pub fn annotation(&self, id: &PersistedId) -> Option<&PersistedAnnotation> {
        self.annotations.get(id).map(|(_, r)| r)
    }
}

impl AnnotationBackend for FakeBackend {
    fn list_annotations(&self, context: &ContextKey) -> Result<FetchResponse, BackendError> {
        let mut annotations: Vec<PersistedAnnotation> = self
            .annotations
            .values()
            .filter(|(ctx, _)| ctx == context)
            .map(|(_, r)| r.clone())
            .collect();
        annotations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(FetchResponse {
            context: self
                .respond_with_context
                .clone()
                .unwrap_or_else(|| context.clone()),
            annotations,
        })
    }

    fn create_annotation(
        &mut self,
        context: &ContextKey,
        draft: &AnnotationSnapshot,
    ) -> Result<PersistedId, BackendError> {
        if let Some(message) = self.fail_next_create.take() {
            return Err(BackendError::new("create", message));
        }
        let id = self.fresh_id();
        let record = PersistedAnnotation {
            id: id.clone(),
            tool_kind: draft.tool_kind.clone(),
            payload: draft.payload.clone(),
            color: None,
            locked: false,
            status: crate::model::AnnotationStatus::Draft,
            free_text: None,
        };
        self.annotations.insert(id.clone(), (context.clone(), record));
        Ok(id)
    }

    fn update_annotation(
        &mut self,
        id: &PersistedId,
        update: &AnnotationUpdate,
    ) -> Result<(), BackendError> {
        self.update_calls += 1;
        if let Some(message) = self.fail_next_update.take() {
            return Err(BackendError::new("update", message));
        }
        let (_, record) = self
            .annotations
            .get_mut(id)
            .ok_or_else(|| BackendError::new("update", format!("unknown id '{id}'")))?;
        if let Some(color) = &update.color {
            record.color = Some(color.clone());
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(locked) = update.locked {
            record.locked = locked;
        }
        if let Some(text) = &update.free_text {
            record.free_text = Some(text.clone());
        }
        Ok(())
    }

    fn delete_annotation(&mut self, id: &PersistedId) -> Result<(), BackendError> {
        if let Some(message) = self.fail_next_delete.take() {
            return Err(BackendError::new("delete", message));
        }
        self.annotations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::new("delete", format!("unknown id '{id}'")))
    }

    fn list_layers(&self, context: &ContextKey) -> Result<LayerFetchResponse, BackendError> {
        let mut layers: Vec<PersistedLayer> = self
            .layers
            .values()
            .filter(|(ctx, _)| ctx == context)
            .map(|(_, r)| r.clone())
            .collect();
        layers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(LayerFetchResponse {
            context: self
                .respond_with_context
                .clone()
                .unwrap_or_else(|| context.clone()),
            layers,
        })
    }

    fn create_layer(
        &mut self,
        context: &ContextKey,
        name: &str,
    ) -> Result<PersistedId, BackendError> {
        if let Some(message) = self.fail_next_create.take() {
            return Err(BackendError::new("create", message));
        }
        let id = self.fresh_id();
        let record = PersistedLayer {
            id: id.clone(),
            name: name.to_string(),
            status: crate::model::AnnotationStatus::Draft,
        };
        self.layers.insert(id.clone(), (context.clone(), record));
        Ok(id)
    }

    fn update_layer(
        &mut self,
        id: &PersistedId,
        update: &AnnotationUpdate,
    ) -> Result<(), BackendError> {
        if let Some(message) = self.fail_next_update.take() {
            return Err(BackendError::new("update", message));
        }
        let (_, record) = self
            .layers
            .get_mut(id)
            .ok_or_else(|| BackendError::new("update", format!("unknown id '{id}'")))?;
        if let Some(status) = update.status {
            record.status = status;
        }
        Ok(())
    }

    fn delete_layer(&mut self, id: &PersistedId) -> Result<(), BackendError> {
        if let Some(message) = self.fail_next_delete.take() {
            return Err(BackendError::new("delete", message));
        }
        self.layers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::new("delete", format!("unknown id '{id}'")))
    }
}
