//! Error taxonomy of the query engine and batch executor.
//!
//! Callers only see the rendered message, so every variant's display string
//! starts with a stable kind prefix.

use thiserror::Error;

use crate::model::{ElementId, ModelError};

use super::transaction::TransactionError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by queries and batch mutations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing request field, or an empty criteria list.
    #[error("ValidationError: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A caller-named reference does not resolve.
    #[error("NotFoundError: {kind} '{name}' not found")]
    NotFound {
        /// What kind of reference (level, workset, view, element, ...).
        kind: &'static str,
        /// The name or id that failed to resolve.
        name: String,
    },

    /// The reference element cannot provide a solid probe.
    #[error("GeometryError: {message}")]
    Geometry {
        /// Description of the geometry problem.
        message: String,
    },

    /// A linked document is not resident.
    #[error("NotLoadedError: linked document '{title}' (link instance {link_id}) is not loaded")]
    NotLoaded {
        /// Link instance id.
        link_id: ElementId,
        /// Title of the linked document.
        title: String,
    },

    /// Rendering or writing an export failed.
    #[error("ExportError: {message}")]
    Export {
        /// Description of the failure.
        message: String,
    },

    /// The host refused an atomic operation.
    #[error("HostError: {0}")]
    Host(#[from] ModelError),

    /// A transaction precondition was violated.
    #[error("TransactionError: {0}")]
    Transaction(#[from] TransactionError),
}

impl EngineError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a not-found error for an element id.
    pub fn element_not_found(id: ElementId) -> Self {
        Self::not_found("Element", id.to_string())
    }

    /// Creates an export error from any displayable cause.
    pub fn export(cause: impl std::fmt::Display) -> Self {
        Self::Export {
            message: cause.to_string(),
        }
    }

    /// Creates a geometry error.
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_prefixes() {
        assert_eq!(
            EngineError::validation("criteria list is empty").to_string(),
            "ValidationError: criteria list is empty"
        );
        assert_eq!(
            EngineError::not_found("Level", "Level 9").to_string(),
            "NotFoundError: Level 'Level 9' not found"
        );
        assert!(EngineError::geometry("no solid")
            .to_string()
            .starts_with("GeometryError:"));
    }

    #[test]
    fn host_error_wraps_model_error() {
        let err: EngineError = ModelError::ElementNotFound { id: ElementId(3) }.into();
        assert_eq!(err.to_string(), "HostError: Element 3 not found");
    }
}
