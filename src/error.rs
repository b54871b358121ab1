//! Error types for the viewer annotation core.

use thiserror::Error;

use crate::model::{AnnotationStatus, AnnotationUid, ViewportId};

/// Errors that can occur in the annotation/segmentation lifecycle core.
///
/// Nothing here is fatal to the viewer; every variant degrades to
/// "operation did not complete".
#[derive(Error, Debug)]
pub enum CoreError {
    /// The backend rejected a persistence call.
    #[error("backend rejected {operation}: {message}")]
    Backend {
        /// The operation that failed ("create", "update", "delete", "fetch")
        operation: String,
        /// Backend-provided failure detail
        message: String,
    },

    /// Mutation targets a Final/Reviewed annotation reserved for drafts.
    #[error("annotation '{uid}' is {status:?} and cannot be modified")]
    PermissionDenied {
        /// The targeted annotation
        uid: AnnotationUid,
        /// Its current status
        status: AnnotationStatus,
    },

    /// Status change would move a status backwards, or needs a capability
    /// the caller does not hold.
    #[error("invalid status transition {from:?} -> {to:?} for '{uid}'")]
    InvalidStatusTransition {
        /// The targeted annotation
        uid: AnnotationUid,
        /// Current status
        from: AnnotationStatus,
        /// Requested status
        to: AnnotationStatus,
    },

    /// Final -> Reviewed requested without reviewer capability.
    #[error("reviewer capability required to mark '{uid}' as reviewed")]
    ReviewerRequired {
        /// The targeted annotation
        uid: AnnotationUid,
    },

    /// Command referenced a viewport that is not registered.
    #[error("viewport '{0}' is not registered")]
    UnknownViewport(ViewportId),

    /// Command referenced an annotation absent from the merged list.
    #[error("annotation '{0}' is not in the current display list")]
    UnknownAnnotation(AnnotationUid),

    /// Command referenced a segmentation layer that is not tracked.
    #[error("segmentation '{0}' is unknown")]
    UnknownSegmentation(String),

    /// JSON serialization of a draft payload failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a backend error with an operation label.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<crate::backend::BackendError> for CoreError {
    fn from(err: crate::backend::BackendError) -> Self {
        Self::Backend {
            operation: err.operation,
            message: err.message,
        }
    }
}
