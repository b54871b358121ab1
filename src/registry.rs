//! Viewport registry: readiness tracking for display panes.
//!
//! A pane is registered when it mounts and unregistered when it unmounts.
//! Tools may only be attached once the rendering engine has confirmed an
//! image on the pane, so readiness is tracked explicitly and the Ready
//! transition is reported back so the active tool can be (re)applied.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::model::{
    ContextKey, Readiness, RenderingEngineId, ToolGroupId, Viewport, ViewportId,
};

/// Tracks every mounted display pane and its readiness.
#[derive(Debug, Default)]
pub struct ViewportRegistry {
    viewports: HashMap<ViewportId, Viewport>,
}

impl ViewportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pane, entering the Registering state.
    ///
    /// Re-registering an existing id resets it to Registering; an Errored
    /// pane rejoins tool attachment this way.
    pub fn register(
        &mut self,
        id: impl Into<ViewportId>,
        engine_id: impl Into<RenderingEngineId>,
        tool_group: impl Into<ToolGroupId>,
        context: impl Into<ContextKey>,
    ) {
        let viewport = Viewport {
            id: id.into(),
            engine_id: engine_id.into(),
            tool_group: tool_group.into(),
            context: context.into(),
            readiness: Readiness::Registering,
        };
        log::debug!(
            "Viewport '{}' registering (group '{}', context '{}')",
            viewport.id,
            viewport.tool_group,
            viewport.context
        );
        self.viewports.insert(viewport.id.clone(), viewport);
    }

    /// Transition Registering -> Ready once the engine confirms an image.
    ///
    /// Returns the pane's tool group so the caller can re-apply the current
    /// tool selection. An Errored pane stays excluded until re-registered.
    pub fn mark_ready(&mut self, id: &ViewportId) -> Result<ToolGroupId, CoreError> {
        let viewport = self
            .viewports
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownViewport(id.clone()))?;
        match viewport.readiness {
            Readiness::Registering => {
                viewport.readiness = Readiness::Ready;
                log::debug!("Viewport '{id}' ready");
            }
            Readiness::Ready => {}
            Readiness::Errored => {
                log::warn!("Viewport '{id}' reported ready while errored; re-register it first");
            }
        }
        Ok(viewport.tool_group.clone())
    }

    /// Record an engine error for a pane, excluding it from tool attachment
    /// and history tracking until re-registered.
    pub fn mark_errored(&mut self, id: &ViewportId) -> Result<(), CoreError> {
        let viewport = self
            .viewports
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownViewport(id.clone()))?;
        viewport.readiness = Readiness::Errored;
        log::warn!("Viewport '{id}' errored");
        Ok(())
    }

    /// Remove all state for a pane and detach it from its tool group.
    pub fn unregister(&mut self, id: &ViewportId) -> Option<Viewport> {
        let removed = self.viewports.remove(id);
        if removed.is_some() {
            log::debug!("Viewport '{id}' unregistered");
        }
        removed
    }

    /// Look up a pane.
    pub fn get(&self, id: &ViewportId) -> Option<&Viewport> {
        self.viewports.get(id)
    }

    /// Whether a pane exists and is Ready.
    pub fn is_ready(&self, id: &ViewportId) -> bool {
        self.viewports
            .get(id)
            .is_some_and(|v| v.readiness == Readiness::Ready)
    }

    /// Ready panes of one tool group, in stable id order.
    pub fn ready_in_group(&self, group: &ToolGroupId) -> Vec<ViewportId> {
        let mut ids: Vec<ViewportId> = self
            .viewports
            .values()
            .filter(|v| &v.tool_group == group && v.readiness == Readiness::Ready)
            .map(|v| v.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ready panes showing one display context, in stable id order.
    ///
    /// Errored panes are excluded from reconciliation and history tracking.
    pub fn ready_in_context(&self, context: &ContextKey) -> Vec<ViewportId> {
        let mut ids: Vec<ViewportId> = self
            .viewports
            .values()
            .filter(|v| &v.context == context && v.readiness == Readiness::Ready)
            .map(|v| v.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Whether any pane, Ready or not, belongs to a tool group.
    pub fn has_group(&self, group: &ToolGroupId) -> bool {
        self.viewports.values().any(|v| &v.tool_group == group)
    }

    /// Number of registered panes.
    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    /// Whether no panes are registered.
    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }
}
