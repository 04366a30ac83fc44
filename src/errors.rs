//! Structured error types for gateway operations.
//!
//! Every variant maps to a stable error code so hosts embedding the
//! gateway can match on failures without parsing message text.  The
//! [`ErrorPayload`] form is what a transport layer would serialize
//! back to callers.

use serde::Serialize;
use thiserror::Error;

/// Gateway error taxonomy.
///
/// Errors carry the offending bucket or path where one exists, and the
/// composite [`StorageError::PartialFailure`] wraps the error of the
/// step that failed after an earlier step had already mutated state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named bucket is not registered.
    #[error("bucket '{bucket}' not found")]
    BucketNotFound { bucket: String },

    /// The object does not exist at the given path.
    #[error("file not found: {pathname}")]
    FileNotFound { pathname: String },

    /// Configuration is invalid or an invariant of the registry was violated.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The backing store rejected or failed the operation.
    #[error("operation failed: {operation}: {message}")]
    OperationFailed { operation: String, message: String },

    /// The backing store denied access.
    #[error("permission denied: {operation}")]
    PermissionDenied { operation: String },

    /// The supplied pathname failed validation.
    #[error("invalid pathname '{pathname}': {reason}")]
    InvalidPathname { pathname: String, reason: String },

    /// A bucket with this name is already registered.
    #[error("bucket '{bucket}' already registered")]
    BucketAlreadyExists { bucket: String },

    /// Visibility must be "public" or "private".
    #[error("visibility must be 'public' or 'private', got '{value}'")]
    InvalidVisibility { value: String },

    /// The operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    OperationTimeout { operation: String },

    /// A move copied the object but failed to remove the source.  The
    /// destination holds a duplicate; nothing is rolled back.
    #[error("copy succeeded but delete failed: {source}")]
    PartialFailure {
        pathname: String,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Return the stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::BucketNotFound { .. } => "BUCKET_NOT_FOUND",
            StorageError::FileNotFound { .. } => "FILE_NOT_FOUND",
            StorageError::InvalidConfig { .. } => "INVALID_CONFIG",
            StorageError::OperationFailed { .. } => "OPERATION_FAILED",
            StorageError::PermissionDenied { .. } => "PERMISSION_DENIED",
            StorageError::InvalidPathname { .. } => "INVALID_PATHNAME",
            StorageError::BucketAlreadyExists { .. } => "BUCKET_ALREADY_EXISTS",
            StorageError::InvalidVisibility { .. } => "INVALID_VISIBILITY",
            StorageError::OperationTimeout { .. } => "OPERATION_TIMEOUT",
            StorageError::PartialFailure { .. } => "PARTIAL_FAILURE",
        }
    }

    /// Additional context for the wire payload, where a variant has any.
    pub fn details(&self) -> Option<String> {
        match self {
            StorageError::BucketNotFound { bucket } => Some(format!("bucket: {bucket}")),
            StorageError::FileNotFound { pathname } => Some(format!("pathname: {pathname}")),
            StorageError::InvalidConfig { reason } => Some(reason.clone()),
            StorageError::OperationFailed { message, .. } => Some(message.clone()),
            StorageError::PermissionDenied { operation } => {
                Some(format!("operation: {operation}"))
            }
            StorageError::InvalidPathname { pathname, reason } => {
                Some(format!("pathname: {pathname}, reason: {reason}"))
            }
            StorageError::BucketAlreadyExists { bucket } => Some(format!("bucket: {bucket}")),
            StorageError::InvalidVisibility { value } => Some(format!("value: {value}")),
            StorageError::OperationTimeout { operation } => {
                Some(format!("operation: {operation}"))
            }
            StorageError::PartialFailure { pathname, source } => {
                Some(format!("pathname: {pathname}, delete error: {source}"))
            }
        }
    }

    /// Convert into the serializable wire form.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Wire representation of a gateway error.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    /// Stable error code (e.g. `FILE_NOT_FOUND`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// -- Tests ---------------------------------------------------------------------
