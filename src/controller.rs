//! Top-level facade owning every component and the injected collaborators.
//!
//! The hosting viewer constructs one `ViewerCore` per session, forwards
//! engine events and UI commands into it, calls `tick` from its frame loop
//! and drains notifications after each dispatch. All cross-component wiring
//! lives here; the components themselves never hold references to each
//! other.

use web_time::Instant;

use crate::backend::AnnotationBackend;
use crate::bridge;
use crate::config::CoreConfig;
use crate::engine::{EngineEvent, RenderingEngine};
use crate::error::CoreError;
use crate::history::HistoryManager;
use crate::keybindings::KeyBindings;
use crate::message::{Notification, UiCommand};
use crate::model::{
    AnnotationStatus, ContextKey, PersistedId, RenderingEngineId, SegmentationId,
    SegmentationLayer, ToolGroupId, ToolSelection, ViewportId,
};
use crate::reconcile::{DisplayAnnotation, Reconciler};
use crate::registry::ViewportRegistry;
use crate::segmentation::SegmentationManager;
use crate::style::StyleStore;
use crate::tools::{Activation, ToolActivator};

/// The annotation/segmentation lifecycle core of a multi-viewport viewer.
pub struct ViewerCore<E: RenderingEngine, B: AnnotationBackend> {
    engine: E,
    backend: B,
    config: CoreConfig,
    registry: ViewportRegistry,
    tools: ToolActivator,
    history: HistoryManager,
    styles: StyleStore,
    reconciler: Reconciler,
    segmentation: SegmentationManager,
    keybindings: KeyBindings,
    notifications: Vec<Notification>,
}

impl<E: RenderingEngine, B: AnnotationBackend> ViewerCore<E, B> {
    /// Create a core for one viewing session.
    ///
    /// `reviewer` grants the Final -> Reviewed status transition.
    pub fn new(
        engine: E,
        backend: B,
        config: CoreConfig,
        context: impl Into<ContextKey>,
        reviewer: bool,
    ) -> Self {
        let styles = StyleStore::new(config.style_retry_attempts, config.style_retry_delay_ms);
        let history = HistoryManager::new(config.max_history);
        Self {
            engine,
            backend,
            config,
            registry: ViewportRegistry::new(),
            tools: ToolActivator::new(),
            history,
            styles,
            reconciler: Reconciler::new(context, reviewer),
            segmentation: SegmentationManager::new(),
            keybindings: KeyBindings::new(),
            notifications: Vec::new(),
        }
    }

    // ========================================================================
    // Viewport lifecycle
    // ========================================================================

    /// Register a mounting display pane. Tools attach once the engine
    /// reports the surface ready.
    pub fn register_viewport(
        &mut self,
        id: impl Into<ViewportId>,
        engine_id: impl Into<RenderingEngineId>,
        tool_group: impl Into<ToolGroupId>,
        context: impl Into<ContextKey>,
    ) {
        self.registry.register(id, engine_id, tool_group, context);
    }

    /// Drop all state for an unmounting pane. Group-level tool state goes
    /// with the last pane of the group.
    pub fn unregister_viewport(&mut self, id: &ViewportId) {
        if let Some(viewport) = self.registry.unregister(id) {
            self.history.drop_viewport(id);
            if !self.registry.has_group(&viewport.tool_group) {
                self.tools.remove_group(&viewport.tool_group);
            }
        }
    }

    // ========================================================================
    // Inbound dispatch
    // ========================================================================

    /// Route one rendering engine event.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        let target = self.segmentation.active_layer().cloned();
        bridge::handle_engine_event(
            event,
            &mut self.registry,
            &mut self.tools,
            &mut self.history,
            &mut self.reconciler,
            &mut self.styles,
            &mut self.engine,
            target.as_ref(),
            &mut self.notifications,
        );
    }

    /// Execute one UI command.
    pub fn handle_command(&mut self, command: UiCommand) -> Result<(), CoreError> {
        match command {
            UiCommand::SelectTool { group, selection } => {
                let tool_name = selection.name.clone();
                let target = self.segmentation.active_layer().cloned();
                let outcome = self.tools.select_tool(
                    &group,
                    selection,
                    &self.registry,
                    &mut self.engine,
                    target.as_ref(),
                );
                match outcome {
                    Activation::Applied(selection) => {
                        self.notifications
                            .push(Notification::ToolChanged { group, selection });
                    }
                    Activation::OneShot { action, .. } => {
                        self.notifications
                            .push(Notification::ToolActionExecuted { group, action });
                    }
                    Activation::SkippedMissingTarget => {
                        self.notifications.push(Notification::ToolActivationSkipped {
                            group,
                            tool: tool_name,
                        });
                    }
                    Activation::Deferred => {}
                }
                Ok(())
            }
            UiCommand::SelectAnnotation(uid) => {
                self.reconciler
                    .select(&uid, &self.registry, &mut self.engine)
            }
            UiCommand::DeselectAnnotation => {
                self.reconciler.deselect(&self.registry, &mut self.engine);
                Ok(())
            }
            UiCommand::Recolor { uid, color } => self.reconciler.recolor(
                &uid,
                &color,
                &mut self.engine,
                &mut self.backend,
                &mut self.styles,
                Instant::now(),
            ),
            UiCommand::SetLocked { uid, locked } => self.reconciler.set_locked(
                &uid,
                locked,
                &mut self.engine,
                &mut self.backend,
                &mut self.styles,
                Instant::now(),
            ),
            UiCommand::SetFreeText { uid, text } => {
                self.reconciler
                    .set_free_text(&uid, &text, &mut self.backend)
            }
            UiCommand::DeleteAnnotation(uid) => self.reconciler.delete(
                &uid,
                &self.registry,
                &mut self.engine,
                &mut self.backend,
                &mut self.styles,
                &mut self.notifications,
            ),
            UiCommand::ChangeStatus { uid, status } => self.reconciler.change_status(
                &uid,
                status,
                &mut self.engine,
                &mut self.backend,
                &mut self.history,
            ),
            UiCommand::SaveDraft(uid) => {
                self.reconciler.save_draft(
                    &uid,
                    &mut self.engine,
                    &mut self.backend,
                    &mut self.history,
                    &mut self.notifications,
                )?;
                Ok(())
            }
            UiCommand::Undo(viewport) => {
                if self.history.undo(&viewport, &mut self.engine) && self.reconciler.mark_dirty() {
                    self.notifications.push(Notification::UpdatesAvailable);
                }
                Ok(())
            }
            UiCommand::Redo(viewport) => {
                if self.history.redo(&viewport, &mut self.engine) && self.reconciler.mark_dirty() {
                    self.notifications.push(Notification::UpdatesAvailable);
                }
                Ok(())
            }
            UiCommand::Refresh => {
                self.reconciler.refresh(
                    &self.registry,
                    &self.engine,
                    &self.backend,
                    &self.styles,
                    &mut self.notifications,
                )?;
                let context = self.reconciler.context().clone();
                self.segmentation.refresh_layers(&context, &self.backend)
            }
            UiCommand::SetContext(context) => {
                self.reconciler.set_context(context);
                Ok(())
            }
            UiCommand::SetActiveLayer(id) => {
                self.segmentation.set_active_layer(&id)?;
                // Groups painting into a segmentation follow the switch.
                for group in self.tools.groups_needing_target() {
                    self.engine.set_active_segmentation(&group, &id);
                }
                Ok(())
            }
        }
    }

    /// Resolve a key press to a tool selection for a group. Returns false
    /// when the key is unbound.
    pub fn handle_key(
        &mut self,
        group: impl Into<ToolGroupId>,
        key: &str,
    ) -> Result<bool, CoreError> {
        let Some(selection) = self.keybindings.selection_for_key(key).cloned() else {
            return Ok(false);
        };
        self.handle_command(UiCommand::SelectTool {
            group: group.into(),
            selection,
        })?;
        Ok(true)
    }

    /// Drive the style retry queue from the host's frame loop.
    pub fn tick(&mut self, now: Instant) {
        for uid in self.styles.tick(&mut self.engine, now) {
            self.notifications.push(Notification::StyleSyncFailed { uid });
        }
    }

    /// Take all notifications accumulated since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // ========================================================================
    // Labelmap strokes
    // ========================================================================

    /// Capture the pre-edit labelmap state as a stroke begins.
    pub fn begin_labelmap_stroke(&mut self, segmentation: &SegmentationId) {
        self.segmentation.begin_stroke(segmentation, &self.engine);
    }

    /// Commit a finished labelmap edit to the viewport's history.
    pub fn commit_labelmap_stroke(
        &mut self,
        viewport: &ViewportId,
        segmentation: &SegmentationId,
    ) -> Result<(), CoreError> {
        self.segmentation
            .commit_stroke(viewport, segmentation, &mut self.engine, &mut self.history)
    }

    // ========================================================================
    // Segmentation layers
    // ========================================================================

    /// Show or hide a layer on every Ready pane of the current context.
    pub fn set_layer_visible(
        &mut self,
        id: &SegmentationId,
        visible: bool,
    ) -> Result<(), CoreError> {
        let viewports = self.registry.ready_in_context(self.reconciler.context());
        self.segmentation
            .set_visible(id, visible, &viewports, &mut self.engine)
    }

    /// Persist a locally created layer.
    pub fn save_layer(&mut self, id: &SegmentationId) -> Result<PersistedId, CoreError> {
        let context = self.reconciler.context().clone();
        self.segmentation.save_layer(id, &context, &mut self.backend)
    }

    /// Select the segment index labelmap tools paint with.
    pub fn set_active_segment(
        &mut self,
        segmentation: &SegmentationId,
        segment: u16,
    ) -> Result<(), CoreError> {
        if self.segmentation.layer(segmentation).is_none() {
            return Err(CoreError::UnknownSegmentation(segmentation.clone()));
        }
        self.engine.set_active_segment(segmentation, segment);
        Ok(())
    }

    /// Move a layer's review status forward.
    pub fn change_layer_status(
        &mut self,
        id: &SegmentationId,
        status: AnnotationStatus,
    ) -> Result<(), CoreError> {
        let context = self.reconciler.context().clone();
        self.segmentation.change_layer_status(
            id,
            status,
            self.reconciler.reviewer(),
            &context,
            &mut self.backend,
        )
    }

    /// Delete a layer everywhere.
    pub fn delete_layer(&mut self, id: &SegmentationId) -> Result<(), CoreError> {
        let context = self.reconciler.context().clone();
        self.segmentation.delete_layer(
            id,
            &self.registry,
            &context,
            &mut self.engine,
            &mut self.backend,
        )
    }

    // ========================================================================
    // Read-side accessors
    // ========================================================================

    /// The merged annotation list with per-entry capability flags.
    pub fn display_list(&self) -> Vec<DisplayAnnotation> {
        self.reconciler.display_list()
    }

    /// Whether engine events invalidated the merged list since the last
    /// refresh.
    pub fn is_dirty(&self) -> bool {
        self.reconciler.is_dirty()
    }

    /// The persistent active tool of a group.
    pub fn active_tool(&self, group: &ToolGroupId) -> Option<&ToolSelection> {
        self.tools.active_tool(group)
    }

    /// All tracked segmentation layers.
    pub fn layers(&self) -> Vec<&SegmentationLayer> {
        self.segmentation.layers()
    }

    /// The segmentation layer labelmap tools paint into.
    pub fn active_layer(&self) -> Option<&SegmentationId> {
        self.segmentation.active_layer()
    }

    /// Undo/redo availability and descriptions per viewport.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Viewport readiness state.
    pub fn registry(&self) -> &ViewportRegistry {
        &self.registry
    }

    /// The keyboard shortcut map, for host-side rebinding.
    pub fn keybindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.keybindings
    }

    /// The configuration this core was built with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The injected rendering engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable engine access, for hosts that drive it directly.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The injected persistence backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend access.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationSnapshot, AnnotationStatus, Origin, ToolCategory};
    use crate::testing::{FakeBackend, FakeEngine};
    use serde_json::json;
    use web_time::Duration;

    fn ready_core() -> ViewerCore<FakeEngine, FakeBackend> {
        let mut core = ViewerCore::new(
            FakeEngine::new(),
            FakeBackend::new(),
            CoreConfig::default(),
            "ctx-1",
            false,
        );
        core.register_viewport("v1", "engine-1", "g1", "ctx-1");
        core.handle_engine_event(EngineEvent::SurfaceReady {
            viewport: "v1".to_string(),
        });
        core
    }

    fn draw(core: &mut ViewerCore<FakeEngine, FakeBackend>, uid: &str) {
        let snapshot = AnnotationSnapshot::local(uid, "Length", json!({"length_mm": 5.0}));
        core.engine_mut()
            .add_annotation(snapshot.clone(), &"v1".to_string());
        core.handle_engine_event(EngineEvent::AnnotationCompleted {
            viewport: "v1".to_string(),
            snapshot,
        });
    }

    #[test]
    fn test_draw_save_refresh_keeps_identity() {
        let mut core = ready_core();
        draw(&mut core, "a1");
        core.handle_command(UiCommand::Refresh).expect("refresh");

        let list = core.display_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].annotation.uid, "a1");
        assert_eq!(list[0].annotation.origin, Origin::Local);

        core.handle_command(UiCommand::SaveDraft("a1".to_string()))
            .expect("save");
        assert!(core
            .drain_notifications()
            .iter()
            .any(|n| matches!(n, Notification::DraftSaved { uid, .. } if uid == "a1")));

        core.handle_command(UiCommand::Refresh).expect("refresh");
        let list = core.display_list();
        assert_eq!(list.len(), 1);
        // The saved draft stays addressable under its engine uid.
        assert_eq!(list[0].annotation.uid, "a1");
        assert_eq!(list[0].annotation.origin, Origin::Persisted);
    }

    #[test]
    fn test_undo_redo_commands_round_trip() {
        let mut core = ready_core();
        draw(&mut core, "a1");

        core.handle_command(UiCommand::Undo("v1".to_string()))
            .expect("undo");
        assert!(core.engine().all_annotations().is_empty());

        core.handle_command(UiCommand::Redo("v1".to_string()))
            .expect("redo");
        assert_eq!(core.engine().all_annotations().len(), 1);
    }

    #[test]
    fn test_saved_draft_is_not_undoable() {
        let mut core = ready_core();
        draw(&mut core, "a1");
        draw(&mut core, "a2");

        core.handle_command(UiCommand::SaveDraft("a2".to_string()))
            .expect("save");

        // Undo skips the saved draft and takes the older local drawing.
        core.handle_command(UiCommand::Undo("v1".to_string()))
            .expect("undo");
        let remaining = core.engine().all_annotations();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].uid, "a2");

        // Nothing left to undo; the saved draft stays in the engine and in
        // the merged list.
        core.handle_command(UiCommand::Undo("v1".to_string()))
            .expect("undo");
        assert_eq!(core.engine().all_annotations().len(), 1);

        core.handle_command(UiCommand::Refresh).expect("refresh");
        let list = core.display_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].annotation.uid, "a2");
        assert_eq!(list[0].annotation.origin, Origin::Persisted);
    }

    #[test]
    fn test_one_shot_keeps_active_tool() {
        let mut core = ready_core();
        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("Zoom", ToolCategory::Navigation),
        })
        .expect("select");
        core.drain_notifications();

        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("ResetView", ToolCategory::Custom),
        })
        .expect("one-shot");

        let notes = core.drain_notifications();
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::ToolActionExecuted { action, .. } if action == "ResetView"
        )));
        assert_eq!(core.active_tool(&"g1".to_string()).unwrap().name, "Zoom");
    }

    #[test]
    fn test_segmentation_tool_needs_layer() {
        let mut core = ready_core();
        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("Brush", ToolCategory::Segmentation),
        })
        .expect("dispatch");
        assert!(core.drain_notifications().iter().any(|n| matches!(
            n,
            Notification::ToolActivationSkipped { tool, .. } if tool == "Brush"
        )));

        // A first stroke creates a layer; activation then succeeds.
        let seg = "seg-1".to_string();
        core.begin_labelmap_stroke(&seg);
        core.engine_mut().write_labelmap(&seg, vec![vec![1]]);
        core.commit_labelmap_stroke(&"v1".to_string(), &seg)
            .expect("commit");

        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("Brush", ToolCategory::Segmentation),
        })
        .expect("dispatch");
        assert_eq!(
            core.engine().active_segmentation(&"g1".to_string()),
            Some(seg)
        );
    }

    #[test]
    fn test_set_active_layer_rebinds_painting_groups() {
        let mut core = ready_core();
        for seg in ["seg-1", "seg-2"] {
            let seg = seg.to_string();
            core.begin_labelmap_stroke(&seg);
            core.engine_mut().write_labelmap(&seg, vec![vec![1]]);
            core.commit_labelmap_stroke(&"v1".to_string(), &seg)
                .expect("commit");
        }
        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("Brush", ToolCategory::Segmentation),
        })
        .expect("select");

        core.handle_command(UiCommand::SetActiveLayer("seg-2".to_string()))
            .expect("switch");
        assert_eq!(
            core.engine().active_segmentation(&"g1".to_string()),
            Some("seg-2".to_string())
        );
        core.set_active_segment(&"seg-2".to_string(), 3)
            .expect("segment");
        assert_eq!(core.engine().active_segment(&"seg-2".to_string()), Some(3));
        // The switch itself is not undoable.
        assert_eq!(
            core.history().stack(&"v1".to_string()).unwrap().undo_count(),
            2
        );
    }

    #[test]
    fn test_key_press_selects_bound_tool() {
        let mut core = ready_core();

        assert!(core.handle_key("g1", "z").expect("dispatch"));
        assert_eq!(core.active_tool(&"g1".to_string()).unwrap().name, "Zoom");

        // Unbound keys are reported without side effects.
        assert!(!core.handle_key("g1", "q").expect("dispatch"));
        assert_eq!(core.active_tool(&"g1".to_string()).unwrap().name, "Zoom");

        core.keybindings_mut()
            .bind("q", ToolSelection::new("Pan", ToolCategory::Navigation));
        assert!(core.handle_key("g1", "q").expect("dispatch"));
        assert_eq!(core.active_tool(&"g1".to_string()).unwrap().name, "Pan");
    }

    #[test]
    fn test_tick_surfaces_exhausted_style_push() {
        let mut core = ready_core();
        draw(&mut core, "a1");
        core.handle_command(UiCommand::Refresh).expect("refresh");
        core.drain_notifications();

        let attempts = core.config().style_retry_attempts;
        core.engine_mut().delay_style_registration("a1", attempts + 1);
        core.handle_command(UiCommand::Recolor {
            uid: "a1".to_string(),
            color: "#FF0000".to_string(),
        })
        .expect("recolor");

        let delay = Duration::from_millis(core.config().style_retry_delay_ms + 1);
        let mut now = Instant::now();
        for _ in 0..attempts {
            now += delay;
            core.tick(now);
        }
        assert!(core.drain_notifications().iter().any(|n| matches!(
            n,
            Notification::StyleSyncFailed { uid } if uid == "a1"
        )));
    }

    #[test]
    fn test_finalized_annotation_rejects_edits_end_to_end() {
        let mut core = ready_core();
        core.backend_mut().seed_annotation(
            "ctx-1",
            crate::backend::PersistedAnnotation {
                id: "db-1".to_string(),
                tool_kind: "Length".to_string(),
                payload: json!({}),
                color: None,
                locked: false,
                status: AnnotationStatus::Final,
                free_text: None,
            },
        );
        core.handle_command(UiCommand::Refresh).expect("refresh");

        let result = core.handle_command(UiCommand::Recolor {
            uid: "db-1".to_string(),
            color: "#00FF00".to_string(),
        });
        assert!(matches!(result, Err(CoreError::PermissionDenied { .. })));

        let result = core.handle_command(UiCommand::DeleteAnnotation("db-1".to_string()));
        assert!(matches!(result, Err(CoreError::PermissionDenied { .. })));
        assert!(core.backend().annotation(&"db-1".to_string()).is_some());
    }

    #[test]
    fn test_unregister_drops_history_and_group_state() {
        let mut core = ready_core();
        draw(&mut core, "a1");
        core.handle_command(UiCommand::SelectTool {
            group: "g1".to_string(),
            selection: ToolSelection::new("Length", ToolCategory::Measurement),
        })
        .expect("select");

        core.unregister_viewport(&"v1".to_string());
        assert!(core.history().stack(&"v1".to_string()).is_none());
        assert!(core.active_tool(&"g1".to_string()).is_none());
        assert!(core.registry().is_empty());
    }

    #[test]
    fn test_context_switch_clears_list_until_refresh() {
        let mut core = ready_core();
        core.backend_mut().seed_annotation(
            "ctx-2",
            crate::backend::PersistedAnnotation {
                id: "db-2".to_string(),
                tool_kind: "Length".to_string(),
                payload: json!({}),
                color: None,
                locked: false,
                status: AnnotationStatus::Draft,
                free_text: None,
            },
        );
        core.handle_command(UiCommand::Refresh).expect("refresh");
        assert!(core.display_list().is_empty());

        core.handle_command(UiCommand::SetContext("ctx-2".to_string()))
            .expect("switch");
        assert!(core.display_list().is_empty());
        assert!(core.is_dirty());

        core.handle_command(UiCommand::Refresh).expect("refresh");
        assert_eq!(core.display_list().len(), 1);
        assert_eq!(core.display_list()[0].annotation.uid, "db-2");
    }
}
