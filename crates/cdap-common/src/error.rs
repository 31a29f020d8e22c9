//! Error types for the CDAP operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the CDAPMaster it concerns (when known) and the
//! offending field or object, so a reconcile loop can surface it on the
//! resource without re-deriving context.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for CDAP operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// The CDAPMaster spec cannot be turned into workloads as written
    #[error("validation error for {app}: {message}")]
    Validation {
        /// Name of the CDAPMaster with invalid configuration
        app: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.logs.storageSize")
        field: Option<String>,
    },

    /// A spec could not be rendered into a platform object
    #[error("render error for {kind} {object}: {message}")]
    Render {
        /// Kind of object being rendered (StatefulSet, Deployment, Service)
        kind: String,
        /// Name of the object being rendered
        object: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "builder", "cli")
        context: String,
    },
}

impl Error {
    /// Create a validation error without CDAPMaster context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            app: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a CDAPMaster
    pub fn validation_for(app: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            app: app.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a CDAPMaster with the field path
    pub fn validation_for_field(
        app: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            app: app.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a render error
    pub fn render(
        kind: impl Into<String>,
        object: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Render {
            kind: kind.into(),
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, render and serialization errors come from the CDAPMaster
    /// itself or from the templates; requeueing without a change reproduces them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Validation { .. } => false,
            Error::Render { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the CDAPMaster name if this error is associated with one
    pub fn app(&self) -> Option<&str> {
        match self {
            Error::Validation { app, .. } => Some(app),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
