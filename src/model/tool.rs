//! Tool selection types.
//!
//! A tool group is the set of viewports sharing one active-tool selection.
//! Exactly one non-auxiliary tool is active per group; the auxiliary wheel
//! bindings are always on regardless of selection.

use serde::{Deserialize, Serialize};

/// Identifier of a tool group (shared by one or more viewports).
pub type ToolGroupId = String;

/// Wheel scroll navigates through the image stack. Always bound.
pub const AUX_WHEEL_NAVIGATE: &str = "StackScroll";

/// Modifier + wheel rotates the viewing plane. Always bound.
pub const AUX_WHEEL_ROTATE: &str = "PlanarRotate";

/// Category of a tool. Drives activation behavior, not rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCategory {
    /// Pan, zoom, window-level and friends.
    Navigation,
    /// Length, angle, area and other measurement tools.
    Measurement,
    /// Probe-style and derived-value tools.
    Advanced,
    /// Freehand markings and text.
    Annotation,
    /// Labelmap editing tools; require an active segmentation target.
    Segmentation,
    /// One-shot actions (reset view, flip, clear, undo). Not persistent
    /// tool states.
    Custom,
}

/// One selectable tool: its engine name plus its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSelection {
    /// Engine tool name, e.g. "Length" or "Brush".
    pub name: String,
    /// Category the tool belongs to.
    pub category: ToolCategory,
}

impl ToolSelection {
    pub fn new(name: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    /// One-shot selections never become the persistent active tool.
    pub fn is_one_shot(&self) -> bool {
        self.category == ToolCategory::Custom
    }

    /// Whether activation needs a resolvable segmentation target first.
    pub fn needs_segmentation_target(&self) -> bool {
        self.category == ToolCategory::Segmentation
    }
}

/// Pointer binding slots the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerBinding {
    /// Primary mouse button / touch.
    Primary,
    /// Mouse wheel.
    Wheel,
    /// Modifier key + wheel.
    ModifierWheel,
}
