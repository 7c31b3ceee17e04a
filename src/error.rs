//! Error taxonomy for the upload pipeline.
//!
//! Adapters translate client-library failures into these variants so nothing
//! reqwest- or serde-specific leaks into the handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;

use crate::models::ErrorBody;

pub type Result<T> = std::result::Result<T, DocParserError>;

#[derive(Debug, thiserror::Error)]
pub enum DocParserError {
    // ── Client errors (HTTP 4xx) ────────────────────────────────────────────
    #[error("No file uploaded.")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Document {0} not found")]
    DocumentNotFound(uuid::Uuid),

    // ── Processing (HTTP 500) ───────────────────────────────────────────────
    #[error("{0}")]
    Configuration(String),

    /// `path` is kept for logs only; it never reaches the response body.
    #[error("Failed to read uploaded file: {source}")]
    Encoding {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("OCR processing failed: {0}")]
    Ocr(String),

    #[error("LLM request failed: {0}")]
    Completion(String),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("CSV export failed: {0}")]
    Export(String),
}

impl DocParserError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DocParserError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = if status.is_client_error() {
            self.to_string()
        } else {
            format!("Processing failed: {}", self)
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        assert_eq!(DocParserError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DocParserError::InvalidRequest("bad boundary".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_adapter_errors_are_server_errors() {
        let errors = [
            DocParserError::Configuration("MISTRAL_API_KEY not set".into()),
            DocParserError::Ocr("connection refused".into()),
            DocParserError::Completion("401".into()),
            DocParserError::MalformedResponse("not an array".into()),
            DocParserError::Storage("disk full".into()),
        ];
        for e in errors {
            assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", e);
        }
    }

    #[test]
    fn test_client_errors_keep_their_status() {
        assert_eq!(
            DocParserError::PayloadTooLarge("length limit exceeded".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            DocParserError::DocumentNotFound(uuid::Uuid::nil()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_encoding_message_hides_path() {
        let e = DocParserError::Encoding {
            path: PathBuf::from("/srv/media/uploads/secret_invoice.pdf"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!e.to_string().contains("/srv/media"));
        assert!(e.to_string().starts_with("Failed to read uploaded file"));
    }

    #[test]
    fn test_missing_file_message() {
        assert_eq!(DocParserError::MissingFile.to_string(), "No file uploaded.");
    }

    #[test]
    fn test_ocr_message_carries_cause() {
        let e = DocParserError::Ocr("dns error: no such host".into());
        assert_eq!(e.to_string(), "OCR processing failed: dns error: no such host");
    }
}
