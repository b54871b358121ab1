//! Routes rendering engine events into the core's state.
//!
//! Every incoming event is classified by origin before anything else:
//! only Local-origin drawings (no persisted-id marker on the snapshot)
//! may enter undo history. Persisted-origin events still mark the merged
//! list dirty and re-render the owning viewport, they just never become
//! undoable. Events arrive in emission order per annotation id, so the
//! created/modified/removed routing below never races itself.

use crate::engine::{EngineEvent, RenderingEngine};
use crate::history::HistoryManager;
use crate::message::Notification;
use crate::model::{Origin, SegmentationId, ViewportId};
use crate::reconcile::Reconciler;
use crate::registry::ViewportRegistry;
use crate::style::StyleStore;
use crate::tools::{Activation, ToolActivator};

/// Dispatch one engine event.
pub fn handle_engine_event(
    event: EngineEvent,
    registry: &mut ViewportRegistry,
    tools: &mut ToolActivator,
    history: &mut HistoryManager,
    reconciler: &mut Reconciler,
    styles: &mut StyleStore,
    engine: &mut dyn RenderingEngine,
    segmentation_target: Option<&SegmentationId>,
    notifications: &mut Vec<Notification>,
) {
    match event {
        EngineEvent::AnnotationCompleted { viewport, snapshot } => {
            if snapshot.origin() == Origin::Local {
                history.record_completed(&viewport, snapshot.clone());
            } else {
                log::debug!(
                    "Hydrated annotation '{}' completed; not undoable",
                    snapshot.uid
                );
            }
            // Engine-side registration is the moment queued style pushes
            // can land.
            styles.sync_annotation(&snapshot.uid, engine);
            touch(&viewport, reconciler, engine, notifications);
        }
        EngineEvent::AnnotationModified { viewport, snapshot } => {
            if snapshot.origin() == Origin::Local {
                history.record_modified(&viewport, snapshot);
            }
            touch(&viewport, reconciler, engine, notifications);
        }
        EngineEvent::AnnotationRemoved { viewport, uid } => {
            history.on_annotation_removed(&viewport, &uid);
            touch(&viewport, reconciler, engine, notifications);
        }
        EngineEvent::SurfaceReady { viewport } => {
            on_surface_ready(
                &viewport,
                registry,
                tools,
                styles,
                engine,
                segmentation_target,
                notifications,
            );
        }
        EngineEvent::SurfaceError { viewport, message } => {
            log::warn!("Surface '{viewport}' failed: {message}");
            if registry.mark_errored(&viewport).is_err() {
                log::warn!("Surface error for unregistered viewport '{viewport}'");
            }
        }
    }
}

/// Mark the merged list stale and repaint the owning viewport.
fn touch(
    viewport: &ViewportId,
    reconciler: &mut Reconciler,
    engine: &mut dyn RenderingEngine,
    notifications: &mut Vec<Notification>,
) {
    if reconciler.mark_dirty() {
        notifications.push(Notification::UpdatesAvailable);
    }
    engine.render(viewport);
}

fn on_surface_ready(
    viewport: &ViewportId,
    registry: &mut ViewportRegistry,
    tools: &mut ToolActivator,
    styles: &mut StyleStore,
    engine: &mut dyn RenderingEngine,
    segmentation_target: Option<&SegmentationId>,
    notifications: &mut Vec<Notification>,
) {
    let group = match registry.mark_ready(viewport) {
        Ok(group) => group,
        Err(err) => {
            log::warn!("Ready signal dropped: {err}");
            return;
        }
    };
    if !registry.is_ready(viewport) {
        // An errored pane must re-register before tools come back.
        return;
    }

    // Annotations hydrated with the surface may have overrides waiting.
    for snapshot in engine.annotations_for_surface(viewport) {
        styles.sync_annotation(&snapshot.uid, engine);
    }

    match tools.on_viewport_ready(&group, registry, engine, segmentation_target) {
        Some(Activation::Applied(selection)) => {
            notifications.push(Notification::ToolChanged { group, selection });
        }
        Some(Activation::SkippedMissingTarget) => {
            log::warn!("Deferred segmentation tool still has no target on group '{group}'");
        }
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
