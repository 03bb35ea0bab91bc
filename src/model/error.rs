//! Error types for element graph operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::element::{ElementId, StorageKind};

/// Result type for element graph operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by the element graph accessor.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Failed to read a model snapshot.
    #[error("Failed to read model: {path}")]
    FileRead {
        /// Path to the snapshot.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to parse a model snapshot.
    #[error("Failed to parse model: {message}")]
    Parse {
        /// Description of what's wrong.
        message: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot is structurally inconsistent.
    #[error("Invalid model: {message}")]
    InvalidModel {
        /// Description of what's wrong.
        message: String,
    },

    /// Element does not exist in the document.
    #[error("Element {id} not found")]
    ElementNotFound {
        /// Requested id.
        id: ElementId,
    },

    /// Parameter is missing or refuses writes.
    #[error("Parameter '{name}' not found or read-only")]
    ParameterNotWritable {
        /// Parameter name.
        name: String,
    },

    /// Value does not fit the parameter's storage kind.
    #[error("Value does not match storage type {expected} of parameter '{name}'")]
    StorageMismatch {
        /// Parameter name.
        name: String,
        /// Storage kind of the parameter.
        expected: StorageKind,
    },

    /// Element type does not exist.
    #[error("Element type {id} not found")]
    TypeNotFound {
        /// Requested type id.
        id: ElementId,
    },

    /// Element type belongs to another category.
    #[error("Type {type_id} is not valid for category '{category}'")]
    IncompatibleType {
        /// Requested type id.
        type_id: ElementId,
        /// Category of the element being changed.
        category: String,
    },

    /// View does not exist.
    #[error("View {id} not found")]
    ViewNotFound {
        /// Requested view id.
        id: ElementId,
    },

    /// The host refused to transform an element.
    #[error("Element {id} cannot be transformed: {reason}")]
    TransformRejected {
        /// Offending element.
        id: ElementId,
        /// Why the transform was refused.
        reason: String,
    },

    /// Degenerate transform input (zero-length axis, zero normal).
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what's wrong.
        message: String,
    },
}

impl ModelError {
    /// Creates a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid model error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }

    /// Creates an invalid geometry error.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// Creates a transform rejection.
    pub fn transform_rejected(id: ElementId, reason: impl Into<String>) -> Self {
        Self::TransformRejected {
            id,
            reason: reason.into(),
        }
    }
}
