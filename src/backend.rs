//! Backend persistence collaborator boundary.
//!
//! The persistence microservice is a network boundary: calls can fail or
//! resolve after the user has moved on. Fetch responses therefore echo the
//! context key they were issued for, so a stale response can be detected and
//! discarded before it is applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnnotationSnapshot, AnnotationStatus, ContextKey, PersistedId};

/// A persistence call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct BackendError {
    /// The operation that failed ("fetch", "create", "update", "delete")
    pub operation: String,
    /// Backend-provided detail
    pub message: String,
}

impl BackendError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// One persisted annotation record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAnnotation {
    /// Stable backend identifier; doubles as the origin marker.
    pub id: PersistedId,
    /// Name of the producing tool.
    pub tool_kind: String,
    /// Opaque geometric/measurement payload.
    pub payload: serde_json::Value,
    /// Stored display color, if any.
    pub color: Option<String>,
    /// Stored lock flag.
    pub locked: bool,
    /// Review status.
    pub status: AnnotationStatus,
    /// Free-text note attached by the operator.
    pub free_text: Option<String>,
}

/// One persisted segmentation layer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLayer {
    /// Stable backend identifier.
    pub id: PersistedId,
    /// Display name.
    pub name: String,
    /// Review status.
    pub status: AnnotationStatus,
}

/// Response to a list-by-context call, echoing the requested context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// The context this response was produced for.
    pub context: ContextKey,
    /// Persisted annotations in that context.
    pub annotations: Vec<PersistedAnnotation>,
}

/// Response to a list-layers call, echoing the requested context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerFetchResponse {
    /// The context this response was produced for.
    pub context: ContextKey,
    /// Persisted segmentation layers in that context.
    pub layers: Vec<PersistedLayer>,
}

/// Field update for a persisted annotation or layer. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationUpdate {
    /// New display color.
    pub color: Option<String>,
    /// New review status.
    pub status: Option<AnnotationStatus>,
    /// New lock flag.
    pub locked: Option<bool>,
    /// New free-text note.
    pub free_text: Option<String>,
}

impl AnnotationUpdate {
    /// Update only the color field.
    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }

    /// Update only the lock flag.
    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Self::default()
        }
    }

    /// Update only the status field.
    pub fn status(status: AnnotationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Update only the free-text note.
    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            free_text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Capability set of the persistence service consumed by this core.
pub trait AnnotationBackend {
    /// List persisted annotations for a display context.
    fn list_annotations(&self, context: &ContextKey) -> Result<FetchResponse, BackendError>;

    /// Persist a locally drawn annotation; returns its stable id.
    fn create_annotation(
        &mut self,
        context: &ContextKey,
        draft: &AnnotationSnapshot,
    ) -> Result<PersistedId, BackendError>;

    /// Update stored fields of a persisted annotation.
    fn update_annotation(
        &mut self,
        id: &PersistedId,
        update: &AnnotationUpdate,
    ) -> Result<(), BackendError>;

    /// Delete a persisted annotation.
    fn delete_annotation(&mut self, id: &PersistedId) -> Result<(), BackendError>;

    /// List persisted segmentation layers for a display context.
    fn list_layers(&self, context: &ContextKey) -> Result<LayerFetchResponse, BackendError>;

    /// Persist a locally painted segmentation layer; returns its stable id.
    fn create_layer(
        &mut self,
        context: &ContextKey,
        name: &str,
    ) -> Result<PersistedId, BackendError>;

    /// Update stored fields of a persisted layer.
    fn update_layer(
        &mut self,
        id: &PersistedId,
        update: &AnnotationUpdate,
    ) -> Result<(), BackendError>;

    /// Delete a persisted segmentation layer.
    fn delete_layer(&mut self, id: &PersistedId) -> Result<(), BackendError>;
}
