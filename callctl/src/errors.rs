use crate::export::ExportError;
use crate::provider::client::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// No call snapshot has been fetched yet for the workspace
    #[error("no call snapshot for workspace {workspace}")]
    SnapshotMissing { workspace: String },

    /// Upstream provider call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// CSV export failed
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::SnapshotMissing { .. } => StatusCode::NOT_FOUND,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} {id} not found"),
            Error::SnapshotMissing { workspace } => {
                format!("No calls have been fetched for workspace {workspace} yet. Trigger a fetch and retry.")
            }
            Error::Provider(provider_err) => format!("Call provider request failed: {provider_err}"),
            Error::Export(_) => "Failed to generate export".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) | Error::Export(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Provider(_) => {
                tracing::error!("Upstream provider error: {:#}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::SnapshotMissing { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
