//! Customizable keyboard shortcuts for tool selection.
//!
//! Keys are host-provided strings (the core never sees raw key events), so
//! bindings serialize alongside the rest of the configuration. A key press
//! resolves to a `ToolSelection` here and goes through the regular
//! `UiCommand::SelectTool` path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ToolCategory, ToolSelection};

/// Shortcut key to tool-selection map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    bindings: HashMap<String, ToolSelection>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        // Default hotkeys: navigation on the left hand, measurements nearby.
        bindings.insert(
            "p".to_string(),
            ToolSelection::new("Pan", ToolCategory::Navigation),
        );
        bindings.insert(
            "z".to_string(),
            ToolSelection::new("Zoom", ToolCategory::Navigation),
        );
        bindings.insert(
            "w".to_string(),
            ToolSelection::new("WindowLevel", ToolCategory::Navigation),
        );
        bindings.insert(
            "l".to_string(),
            ToolSelection::new("Length", ToolCategory::Measurement),
        );
        bindings.insert(
            "b".to_string(),
            ToolSelection::new("Bidirectional", ToolCategory::Measurement),
        );
        bindings.insert(
            "e".to_string(),
            ToolSelection::new("EllipticalROI", ToolCategory::Measurement),
        );
        bindings.insert(
            "a".to_string(),
            ToolSelection::new("ArrowAnnotate", ToolCategory::Annotation),
        );
        bindings.insert(
            "g".to_string(),
            ToolSelection::new("Brush", ToolCategory::Segmentation),
        );
        Self { bindings }
    }
}

impl KeyBindings {
    /// Create bindings with the default hotkeys.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tool selection bound to a key press, if any.
    pub fn selection_for_key(&self, key: &str) -> Option<&ToolSelection> {
        self.bindings.get(key)
    }

    /// The key bound to a tool name, if any.
    pub fn key_for_tool(&self, tool: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, selection)| selection.name == tool)
            .map(|(key, _)| key.as_str())
    }

    /// Bind a key to a selection, replacing any previous binding of that key
    /// and any previous key of that tool.
    pub fn bind(&mut self, key: impl Into<String>, selection: ToolSelection) {
        self.bindings
            .retain(|_, bound| bound.name != selection.name);
        self.bindings.insert(key.into(), selection);
    }

    /// Remove the binding for a key.
    pub fn unbind(&mut self, key: &str) -> Option<ToolSelection> {
        self.bindings.remove(key)
    }
}
