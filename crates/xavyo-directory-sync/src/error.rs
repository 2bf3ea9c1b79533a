//! Directory sync error types
//!
//! Two layers: [`RemoteError`] is what the remote-call collaborators report,
//! [`SyncError`] is what the engine surfaces per object. Both carry a
//! transient/permanent classification for the caller's retry decisions.

use thiserror::Error;

/// Message payload the directory API returns when removing a sub-resource
/// whose owning resource id no longer resolves.
pub const ALREADY_ABSENT_MESSAGE: &str = "Invalid Input: resource_id";

/// Failure reported by a remote store (object, collection, settings, admin).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The addressed resource does not exist.
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// The remote API rejected the request payload.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The resource already exists (create conflict).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Rate limit or quota exhausted.
    #[error("rate limited")]
    RateLimited,

    /// Backend temporarily unavailable.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// Any other failure.
    #[error("remote call failed: {message}")]
    Failed { message: String },
}

impl RemoteError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        RemoteError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        RemoteError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RemoteError::Failed {
            message: message.into(),
        }
    }

    /// Whether this is a plain `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }

    /// Whether a remove/delete failing with this error means the target is
    /// already gone.
    ///
    /// Besides `NotFound`, the directory API answers some removals of
    /// already-deleted sub-resources with an `InvalidInput` carrying
    /// [`ALREADY_ABSENT_MESSAGE`]; that exact payload counts as absent too.
    pub fn is_already_absent(&self) -> bool {
        match self {
            RemoteError::NotFound { .. } => true,
            RemoteError::InvalidInput { message } => message == ALREADY_ABSENT_MESSAGE,
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited | RemoteError::Unavailable { .. }
        )
    }
}

/// Error that can occur while synchronizing one object.
#[derive(Debug, Error)]
pub enum SyncError {
    // Configuration / schema errors (permanent)
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A fixed-type list names the same type twice.
    #[error("duplicate fixed type '{fixed_type}' configured for '{field}'")]
    DuplicateFixedType { field: String, fixed_type: String },

    /// An object type definition is inconsistent (anchor, duplicate names).
    #[error("invalid schema for object type '{object_type}': {message}")]
    InvalidSchema {
        object_type: String,
        message: String,
    },

    /// An attribute change names a field the object type does not define.
    #[error("attribute '{attribute}' is not defined on object type '{object_type}'")]
    UnknownAttribute {
        attribute: String,
        object_type: String,
    },

    /// A modification type reached a component that cannot handle it.
    #[error("modification type {modification} is not supported for '{attribute}'")]
    UnsupportedModificationType {
        attribute: String,
        modification: String,
    },

    /// A value could not be converted to the field's type.
    #[error("invalid value for attribute '{attribute}': {message}")]
    InvalidValue { attribute: String, message: String },

    /// JSON encoding/decoding failed.
    #[error("serialization error for attribute '{attribute}': {source}")]
    Serialization {
        attribute: String,
        #[source]
        source: serde_json::Error,
    },

    // Remote errors
    /// A base-object remote call failed.
    #[error("remote {operation} failed for {identity}: {source}")]
    Remote {
        operation: &'static str,
        identity: String,
        #[source]
        source: RemoteError,
    },

    /// A sub-resource call failed while reconciling one attribute.
    #[error("reconciliation of '{attribute}' failed for {identity}: {source}")]
    Reconciliation {
        identity: String,
        attribute: String,
        #[source]
        source: RemoteError,
    },
}

impl SyncError {
    /// Check if this error is transient and the object should be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Remote { source, .. } | SyncError::Reconciliation { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// The attribute the failure is attached to, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            SyncError::UnknownAttribute { attribute, .. }
            | SyncError::UnsupportedModificationType { attribute, .. }
            | SyncError::InvalidValue { attribute, .. }
            | SyncError::Serialization { attribute, .. }
            | SyncError::Reconciliation { attribute, .. } => Some(attribute),
            SyncError::DuplicateFixedType { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            SyncError::DuplicateFixedType { .. } => "DUPLICATE_FIXED_TYPE",
            SyncError::InvalidSchema { .. } => "INVALID_SCHEMA",
            SyncError::UnknownAttribute { .. } => "UNKNOWN_ATTRIBUTE",
            SyncError::UnsupportedModificationType { .. } => "UNSUPPORTED_MODIFICATION",
            SyncError::InvalidValue { .. } => "INVALID_VALUE",
            SyncError::Serialization { .. } => "SERIALIZATION_ERROR",
            SyncError::Remote { .. } => "REMOTE_FAILED",
            SyncError::Reconciliation { .. } => "RECONCILIATION_FAILED",
        }
    }

    // Convenience constructors

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        SyncError::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn invalid_value(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::InvalidValue {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn remote(operation: &'static str, identity: impl Into<String>, source: RemoteError) -> Self {
        SyncError::Remote {
            operation,
            identity: identity.into(),
            source,
        }
    }

    pub fn reconciliation(
        identity: impl Into<String>,
        attribute: impl Into<String>,
        source: RemoteError,
    ) -> Self {
        SyncError::Reconciliation {
            identity: identity.into(),
            attribute: attribute.into(),
            source,
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
