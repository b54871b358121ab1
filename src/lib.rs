//! MIVAT - Medical Imaging Viewer Annotation Toolkit
//!
//! The annotation and segmentation lifecycle core of a multi-viewport
//! medical image viewer. The rendering engine and the persistence backend
//! are injected behind traits; the hosting UI drives the core with
//! commands and engine events and drains notifications back out.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod history;
pub mod keybindings;
pub mod message;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod segmentation;
pub mod style;
pub mod tools;

#[cfg(test)]
mod testing;

pub use backend::AnnotationBackend;
pub use config::CoreConfig;
pub use controller::ViewerCore;
pub use engine::{EngineEvent, RenderingEngine};
pub use error::CoreError;
pub use message::{Notification, UiCommand};
