//! Tool activation state machine.
//!
//! One persistent tool is active per tool group. Selecting a tool passivates
//! every non-auxiliary tool on the group's Ready viewports, binds the new
//! tool to the primary pointer action and re-asserts the always-on wheel
//! bindings. Segmentation tools additionally need an active segmentation
//! target resolved before anything is touched; one-shot (Custom) selections
//! execute without ever becoming the active tool.

use std::collections::{BTreeSet, HashMap};

use crate::engine::RenderingEngine;
use crate::model::{
    AUX_WHEEL_NAVIGATE, AUX_WHEEL_ROTATE, PointerBinding, SegmentationId, ToolGroupId,
    ToolSelection,
};
use crate::registry::ViewportRegistry;

/// Outcome of a tool selection request.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// The tool is now active on every Ready viewport of the group.
    Applied(ToolSelection),
    /// A one-shot action; the previously active tool is still selected.
    OneShot {
        /// Name of the executed action
        action: String,
        /// Tool reported as still selected
        previous: Option<ToolSelection>,
    },
    /// No viewport in the group is Ready yet; retried on the next Ready
    /// transition.
    Deferred,
    /// Segmentation tool with no resolvable target; previous tool remains.
    SkippedMissingTarget,
}

#[derive(Debug, Default)]
struct GroupTools {
    /// The persistent active tool, if one has been applied.
    active: Option<ToolSelection>,
    /// Selection waiting for the first Ready viewport.
    deferred: Option<ToolSelection>,
    /// Non-auxiliary tool names this group has ever activated.
    seen: BTreeSet<String>,
}

/// Per-group tool activation state.
#[derive(Debug, Default)]
pub struct ToolActivator {
    groups: HashMap<ToolGroupId, GroupTools>,
}

impl ToolActivator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The persistent active tool of a group, if any.
    pub fn active_tool(&self, group: &ToolGroupId) -> Option<&ToolSelection> {
        self.groups.get(group).and_then(|g| g.active.as_ref())
    }

    /// Select a tool for a group.
    ///
    /// `segmentation_target` is the resolved active segmentation for the
    /// group, required only by Segmentation-category tools. Activation is
    /// all-or-nothing: when the prerequisite is missing nothing is
    /// passivated and the previous tool stays active.
    pub fn select_tool(
        &mut self,
        group: &ToolGroupId,
        selection: ToolSelection,
        registry: &ViewportRegistry,
        engine: &mut dyn RenderingEngine,
        segmentation_target: Option<&SegmentationId>,
    ) -> Activation {
        let state = self.groups.entry(group.clone()).or_default();

        if selection.is_one_shot() {
            log::debug!("One-shot action '{}' on group '{group}'", selection.name);
            return Activation::OneShot {
                action: selection.name,
                previous: state.active.clone(),
            };
        }

        let ready = registry.ready_in_group(group);
        if ready.is_empty() {
            log::debug!(
                "No ready viewport in group '{group}'; deferring '{}'",
                selection.name
            );
            state.deferred = Some(selection);
            return Activation::Deferred;
        }

        if selection.needs_segmentation_target() {
            let Some(target) = segmentation_target else {
                log::warn!(
                    "Segmentation tool '{}' skipped: no active segmentation for group '{group}'",
                    selection.name
                );
                return Activation::SkippedMissingTarget;
            };
            engine.set_active_segmentation(group, target);
        }

        for tool in &state.seen {
            engine.set_tool_passive(group, tool);
        }
        engine.set_tool_active(group, &selection.name, PointerBinding::Primary);

        // Auxiliary bindings are never owned by the selection; re-assert.
        engine.set_tool_active(group, AUX_WHEEL_NAVIGATE, PointerBinding::Wheel);
        engine.set_tool_active(group, AUX_WHEEL_ROTATE, PointerBinding::ModifierWheel);

        log::debug!(
            "Tool '{}' active on group '{group}' ({} viewport(s))",
            selection.name,
            ready.len()
        );
        state.seen.insert(selection.name.clone());
        state.active = Some(selection.clone());
        state.deferred = None;
        Activation::Applied(selection)
    }

    /// React to a viewport becoming Ready: flush a deferred selection, or
    /// re-apply the current tool so the new pane picks it up.
    pub fn on_viewport_ready(
        &mut self,
        group: &ToolGroupId,
        registry: &ViewportRegistry,
        engine: &mut dyn RenderingEngine,
        segmentation_target: Option<&SegmentationId>,
    ) -> Option<Activation> {
        let state = self.groups.get_mut(group)?;
        let selection = state.deferred.take().or_else(|| state.active.clone())?;
        Some(self.select_tool(group, selection, registry, engine, segmentation_target))
    }

    /// Groups whose persistent active tool paints into a segmentation.
    pub fn groups_needing_target(&self) -> Vec<ToolGroupId> {
        let mut groups: Vec<ToolGroupId> = self
            .groups
            .iter()
            .filter(|(_, state)| {
                state
                    .active
                    .as_ref()
                    .is_some_and(ToolSelection::needs_segmentation_target)
            })
            .map(|(group, _)| group.clone())
            .collect();
        groups.sort();
        groups
    }

    /// Drop all state for a group (last viewport unmounted).
    pub fn remove_group(&mut self, group: &ToolGroupId) {
        self.groups.remove(group);
    }
}
