//! Viewport identity and readiness.

use serde::{Deserialize, Serialize};

use super::annotation::ContextKey;
use super::tool::ToolGroupId;

/// Identifier of one display pane.
pub type ViewportId = String;

/// Identifier of the rendering surface a viewport is bound to.
pub type RenderingEngineId = String;

/// Readiness of a display pane.
///
/// A viewport is only Ready once the rendering engine confirms an image is
/// actually loaded; attaching tools to an un-imaged pane is unsafe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    /// Pane mounted, image not yet confirmed.
    Registering,
    /// Image loaded, safe for tool attachment and history tracking.
    Ready,
    /// Engine reported an error; excluded until re-registered.
    Errored,
}

/// One registered display pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pane identifier.
    pub id: ViewportId,
    /// Rendering surface this pane draws on.
    pub engine_id: RenderingEngineId,
    /// Tool group sharing the active-tool selection.
    pub tool_group: ToolGroupId,
    /// Display context (study/series) shown in this pane.
    pub context: ContextKey,
    /// Current readiness.
    pub readiness: Readiness,
}
