//! Error types for the Civo CSI plugin
//!
//! Every failure a provisioning call can end in is a variant here, carrying
//! enough detail (volume id, observed status, quota numbers) to diagnose it
//! without going to the backend. `Error::code` is the bridge into the
//! provisioning protocol's status vocabulary.

use thiserror::Error;
use tonic::Code;

/// Unified error type for the plugin
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Volume {name} already exists with a different size: existing {existing_gb} GB, requested {requested_gb} GB"
    )]
    VolumeExists {
        name: String,
        existing_gb: u64,
        requested_gb: u64,
    },

    #[error("Operation not implemented: {operation}")]
    Unimplemented { operation: String },

    // =========================================================================
    // Quota Errors
    // =========================================================================
    #[error(
        "Requested volume would exceed volume space quota by {shortfall_gb} GB (requested {requested_gb} GB, available {available_gb} GB)"
    )]
    QuotaCapacityExceeded {
        requested_gb: u64,
        available_gb: i64,
        shortfall_gb: i64,
    },

    #[error("Requested volume would exceed volume count limit quota of {limit} (in use: {usage})")]
    QuotaVolumeCountExceeded { limit: i64, usage: i64 },

    // =========================================================================
    // Availability Errors
    // =========================================================================
    #[error("Volume {volume_id} is not \"available\" after {attempts} attempts, state is currently {status:?}")]
    VolumeUnavailable {
        volume_id: String,
        status: String,
        attempts: u32,
    },

    #[error("Waiting for volume {volume_id} was cancelled")]
    Cancelled { volume_id: String },

    // =========================================================================
    // Backend Errors
    // =========================================================================
    #[error("Backend API error during {operation} (HTTP {status}): {reason}")]
    BackendApi {
        operation: String,
        status: u16,
        reason: String,
    },

    #[error("Backend connection error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Protocol status code reported for this error
    pub fn code(&self) -> Code {
        match self {
            Error::InvalidArgument(_) => Code::InvalidArgument,
            Error::VolumeExists { .. } => Code::AlreadyExists,
            Error::QuotaCapacityExceeded { .. } | Error::QuotaVolumeCountExceeded { .. } => {
                Code::OutOfRange
            }
            Error::VolumeUnavailable { .. } => Code::Unavailable,
            Error::Cancelled { .. } => Code::Cancelled,
            Error::Unimplemented { .. } => Code::Unimplemented,

            // Backend faults are passed through verbatim as internal errors
            Error::BackendApi { .. }
            | Error::Http(_)
            | Error::JsonParse(_)
            | Error::Configuration(_)
            | Error::Io(_)
            | Error::Internal(_) => Code::Internal,
        }
    }

    /// Check if this error is a transient backend fault.
    ///
    /// Only used for log classification; no layer of the plugin retries on it.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::BackendApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Build a backend error for a failed operation
    pub fn backend(operation: &str, status: u16, reason: impl Into<String>) -> Self {
        Error::BackendApi {
            operation: operation.to_string(),
            status,
            reason: reason.into(),
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        tonic::Status::new(err.code(), err.to_string())
    }
}

/// Result type alias for the plugin
pub type Result<T> = std::result::Result<T, Error>;
