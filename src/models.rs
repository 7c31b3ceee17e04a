//! Request/response and record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Sentinel value the model uses for requested fields it could not find.
pub const NOT_FOUND: &str = "Not found";

/// Record of a stored upload. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub file: PathBuf,
    pub uploaded_at: DateTime<Utc>,
    pub original_name: String,
    pub size: u64,
    pub sha256: String,
}

/// One extracted `(field, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub field: String,
    pub value: String,
}

impl DataPoint {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.value == NOT_FOUND
    }
}

/// Successful response payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub markdown: String,
    pub data_points: Vec<DataPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
