//! Segmentation layer bookkeeping and labelmap snapshotting.
//!
//! Labelmap edits are recorded as paired snapshots: the state captured when
//! a stroke begins and the state when it commits. The commit lands on the
//! owning viewport's history stack, so undo restores the pre-stroke state
//! (or clears the segmentation entirely when the stroke created it).
//! Switching the visible layer never creates a history entry; only
//! content-mutating edits do.

use std::collections::HashMap;

use crate::backend::{AnnotationBackend, AnnotationUpdate};
use crate::engine::RenderingEngine;
use crate::error::CoreError;
use crate::history::HistoryManager;
use crate::model::{
    AnnotationStatus, ContextKey, Origin, PersistedId, SegmentationId, SegmentationLayer,
    SegmentationSnapshot, ViewportId,
};
use crate::registry::ViewportRegistry;

/// Tracks segmentation layers, the active edit target, and in-flight
/// stroke captures.
#[derive(Debug, Default)]
pub struct SegmentationManager {
    layers: HashMap<SegmentationId, SegmentationLayer>,
    active: Option<SegmentationId>,
    /// Pre-stroke labelmap captures, keyed by segmentation.
    pending_strokes: HashMap<SegmentationId, Option<SegmentationSnapshot>>,
}

impl SegmentationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The segmentation that labelmap tools currently paint into.
    pub fn active_layer(&self) -> Option<&SegmentationId> {
        self.active.as_ref()
    }

    /// All tracked layers, in stable id order.
    pub fn layers(&self) -> Vec<&SegmentationLayer> {
        let mut layers: Vec<&SegmentationLayer> = self.layers.values().collect();
        layers.sort_by(|a, b| a.id.cmp(&b.id));
        layers
    }

    /// Look up a tracked layer.
    pub fn layer(&self, id: &SegmentationId) -> Option<&SegmentationLayer> {
        self.layers.get(id)
    }

    /// Switch the active layer. Creates no history entry.
    pub fn set_active_layer(&mut self, id: &SegmentationId) -> Result<(), CoreError> {
        if !self.layers.contains_key(id) {
            return Err(CoreError::UnknownSegmentation(id.clone()));
        }
        log::debug!("Active segmentation -> '{id}'");
        self.active = Some(id.clone());
        Ok(())
    }

    /// Register a Local layer on first paint; a no-op when already tracked.
    /// The first tracked layer becomes the active one.
    pub fn ensure_layer(&mut self, id: &SegmentationId, name: &str) {
        if !self.layers.contains_key(id) {
            log::debug!("Segmentation layer '{id}' created on first paint");
            self.layers
                .insert(id.clone(), SegmentationLayer::local(id.clone(), name));
        }
        if self.active.is_none() {
            self.active = Some(id.clone());
        }
    }

    /// Merge persisted layers fetched for a display context. A response for
    /// a different context is stale and discarded. Local layers are kept.
    pub fn refresh_layers(
        &mut self,
        context: &ContextKey,
        backend: &dyn AnnotationBackend,
    ) -> Result<(), CoreError> {
        let response = backend.list_layers(context)?;
        if &response.context != context {
            log::debug!(
                "Discarding stale layer fetch for context '{}'",
                response.context
            );
            return Ok(());
        }

        self.layers.retain(|_, layer| layer.origin == Origin::Local);
        for record in response.layers {
            let layer = SegmentationLayer {
                id: record.id.clone(),
                persisted_id: Some(record.id.clone()),
                origin: Origin::Persisted,
                name: record.name,
                visible: true,
                status: record.status,
            };
            self.layers.insert(layer.id.clone(), layer);
        }
        Ok(())
    }

    /// Capture the current labelmap state of a segmentation.
    pub fn capture(
        &self,
        id: &SegmentationId,
        engine: &dyn RenderingEngine,
    ) -> Result<SegmentationSnapshot, CoreError> {
        let slices = engine
            .labelmap(id)
            .ok_or_else(|| CoreError::UnknownSegmentation(id.clone()))?;
        Ok(SegmentationSnapshot::capture(id.clone(), slices))
    }

    /// Capture the pre-stroke state before a labelmap edit begins.
    ///
    /// `None` is recorded when the segmentation does not exist yet; the
    /// matching undo then clears it instead of restoring.
    pub fn begin_stroke(&mut self, id: &SegmentationId, engine: &dyn RenderingEngine) {
        let before = engine
            .labelmap(id)
            .map(|slices| SegmentationSnapshot::capture(id.clone(), slices));
        self.pending_strokes.insert(id.clone(), before);
    }

    /// Commit a finished labelmap edit to the owning viewport's history.
    pub fn commit_stroke(
        &mut self,
        viewport: &ViewportId,
        id: &SegmentationId,
        engine: &mut dyn RenderingEngine,
        history: &mut HistoryManager,
    ) -> Result<(), CoreError> {
        let after = self.capture(id, engine)?;
        let before = self.pending_strokes.remove(id).flatten();
        self.ensure_layer(id, id);
        history.record_segmentation_edit(viewport, id, after, before);
        engine.render(viewport);
        Ok(())
    }

    /// Show or hide a layer on the given viewports.
    pub fn set_visible(
        &mut self,
        id: &SegmentationId,
        visible: bool,
        viewports: &[ViewportId],
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), CoreError> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownSegmentation(id.clone()))?;
        layer.visible = visible;
        for viewport in viewports {
            if visible {
                engine.add_representation(viewport, id);
            } else {
                engine.remove_representation(viewport, id);
            }
            engine.render(viewport);
        }
        Ok(())
    }

    /// Persist a Local layer; returns the backend id.
    pub fn save_layer(
        &mut self,
        id: &SegmentationId,
        context: &ContextKey,
        backend: &mut dyn AnnotationBackend,
    ) -> Result<PersistedId, CoreError> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownSegmentation(id.clone()))?;
        if let Some(persisted) = &layer.persisted_id {
            return Ok(persisted.clone());
        }
        let persisted_id = backend.create_layer(context, &layer.name)?;
        layer.persisted_id = Some(persisted_id.clone());
        layer.origin = Origin::Persisted;
        layer.status = AnnotationStatus::Draft;
        log::debug!("Segmentation layer '{id}' saved as '{persisted_id}'");
        Ok(persisted_id)
    }

    /// Move a layer's review status forward, saving a Local layer first.
    ///
    /// Same monotonic policy as annotations: Draft -> Final for anyone,
    /// Final -> Reviewed only with reviewer capability.
    pub fn change_layer_status(
        &mut self,
        id: &SegmentationId,
        target: AnnotationStatus,
        reviewer: bool,
        context: &ContextKey,
        backend: &mut dyn AnnotationBackend,
    ) -> Result<(), CoreError> {
        let (from, persisted) = {
            let layer = self
                .layers
                .get(id)
                .ok_or_else(|| CoreError::UnknownSegmentation(id.clone()))?;
            (layer.status, layer.persisted_id.clone())
        };

        let allowed = match (from, target) {
            (AnnotationStatus::Draft, AnnotationStatus::Final) => true,
            (AnnotationStatus::Final, AnnotationStatus::Reviewed) => {
                if !reviewer {
                    return Err(CoreError::ReviewerRequired { uid: id.clone() });
                }
                true
            }
            _ => false,
        };
        if !allowed || !from.can_transition_to(target) {
            return Err(CoreError::InvalidStatusTransition {
                uid: id.clone(),
                from,
                to: target,
            });
        }

        let persisted_id = match persisted {
            Some(persisted) => persisted,
            None => self.save_layer(id, context, backend)?,
        };
        backend.update_layer(&persisted_id, &AnnotationUpdate::status(target))?;
        if let Some(layer) = self.layers.get_mut(id) {
            layer.status = target;
        }
        log::debug!("Segmentation layer '{id}' status {from:?} -> {target:?}");
        Ok(())
    }

    /// Delete a layer from the engine, this manager and, if persisted, the
    /// backend. Final/Reviewed persisted layers are immutable.
    pub fn delete_layer(
        &mut self,
        id: &SegmentationId,
        registry: &ViewportRegistry,
        context: &ContextKey,
        engine: &mut dyn RenderingEngine,
        backend: &mut dyn AnnotationBackend,
    ) -> Result<(), CoreError> {
        let layer = self
            .layers
            .get(id)
            .ok_or_else(|| CoreError::UnknownSegmentation(id.clone()))?;
        if !layer.is_mutable() {
            return Err(CoreError::PermissionDenied {
                uid: id.clone(),
                status: layer.status,
            });
        }
        let persisted_id = layer.persisted_id.clone();

        for viewport in registry.ready_in_context(context) {
            engine.remove_representation(&viewport, id);
            engine.render(&viewport);
        }
        engine.clear_labelmap(id);
        if let Some(persisted) = persisted_id {
            backend.delete_layer(&persisted)?;
        }
        self.layers.remove(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        log::debug!("Segmentation layer '{id}' deleted");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
