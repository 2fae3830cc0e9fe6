use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Malformed document: {message}")]
    MalformedDocument { message: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Storage operation failed")]
    Storage(#[from] StorageError),

    /// Never distinguishes a missing record from one owned by another account.
    #[error("Not found")]
    NotFoundOrForbidden,

    #[error("No data available")]
    NoData,

    #[error("No documents found matching the criteria")]
    NoMatch,

    #[error("Document {document_id} was deleted while it was being ingested")]
    IngestionCancelled { document_id: String },

    #[error("Failed to delete account {account_id}")]
    AccountDeletionFailed { account_id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of the metadata or blob store on a required record
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Blob store error")]
    Blob(#[from] BlobError),
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },
}

/// Blob store errors
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid blob key: {key}")]
    InvalidKey { key: String },

    #[error("Blob I/O failed for {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a picture description could not be obtained.
///
/// Every variant means "description unavailable" to the ingestion pipeline:
/// the picture is skipped and the upload carries on.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Connection failed to description service at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Description request failed (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from description service")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("Description service returned no completions")]
    EmptyCompletion,
}

impl From<DatabaseError> for ServiceError {
    fn from(error: DatabaseError) -> Self {
        ServiceError::Storage(StorageError::Database(error))
    }
}

impl From<BlobError> for ServiceError {
    fn from(error: BlobError) -> Self {
        ServiceError::Storage(StorageError::Blob(error))
    }
}

/// Render an error and all of its sources on one line, for log fields.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// API error response (matches Axum's built-in JsonRejection format)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput { .. } | ServiceError::AccountDeletionFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::MalformedDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::IngestionCancelled { .. } => StatusCode::CONFLICT,
            ServiceError::NotFoundOrForbidden | ServiceError::NoData | ServiceError::NoMatch => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Storage(_) | ServiceError::Config { .. } | ServiceError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidInput { .. } => "invalid_input",
            ServiceError::MalformedDocument { .. } => "malformed_document",
            ServiceError::FileTooLarge { .. } => "file_too_large",
            ServiceError::Storage(StorageError::Database(_)) => "database_error",
            ServiceError::Storage(StorageError::Blob(_)) => "blob_error",
            ServiceError::NotFoundOrForbidden => "not_found",
            ServiceError::NoData => "no_data",
            ServiceError::NoMatch => "no_match",
            ServiceError::IngestionCancelled { .. } => "ingestion_cancelled",
            ServiceError::AccountDeletionFailed { .. } => "account_deletion_failed",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
