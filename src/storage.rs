//! On-disk storage for uploaded documents.
//!
//! Files land in `<media_root>/uploads/<id>_<name>` with a JSON record next to
//! them at `<media_root>/uploads/<id>.json`. Nothing here is ever deleted.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DocParserError, Result};
use crate::models::UploadedDocument;

const UPLOAD_DIR: &str = "uploads";
const FALLBACK_NAME: &str = "document.pdf";

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            root: media_root.into(),
        }
    }

    fn upload_dir(&self) -> PathBuf {
        self.root.join(UPLOAD_DIR)
    }

    /// Persist an upload and return its record.
    pub async fn save(&self, filename: &str, data: &[u8]) -> Result<UploadedDocument> {
        let dir = self.upload_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error(&dir, e))?;

        let id = Uuid::new_v4();
        let name = safe_file_name(filename);
        let path = dir.join(format!("{}_{}", id.simple(), name));

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| storage_error(&path, e))?;

        let doc = UploadedDocument {
            id,
            file: path,
            uploaded_at: Utc::now(),
            original_name: filename.to_string(),
            size: data.len() as u64,
            sha256: format!("{:x}", Sha256::digest(data)),
        };

        let record_path = self.record_path(&doc.id);
        let record = serde_json::to_vec_pretty(&doc)
            .map_err(|e| DocParserError::Storage(format!("record for {}: {}", doc.id, e)))?;
        tokio::fs::write(&record_path, record)
            .await
            .map_err(|e| storage_error(&record_path, e))?;

        info!(
            "DocumentStore: stored {} ({} bytes) as {:?}",
            filename, doc.size, doc.file
        );
        debug!("DocumentStore: sha256={}", doc.sha256);
        Ok(doc)
    }

    /// Load a previously written record.
    pub async fn load(&self, id: &Uuid) -> Result<UploadedDocument> {
        let path = self.record_path(id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DocParserError::DocumentNotFound(*id));
            }
            Err(e) => return Err(storage_error(&path, e)),
        };
        serde_json::from_slice(&raw).map_err(|e| storage_error(&path, e))
    }

    fn record_path(&self, id: &Uuid) -> PathBuf {
        self.upload_dir().join(format!("{}.json", id.simple()))
    }
}

/// Log the failing path and keep it out of the error that reaches clients.
fn storage_error(path: &Path, e: impl std::fmt::Display) -> DocParserError {
    error!("DocumentStore: {:?}: {}", path, e);
    DocParserError::Storage(e.to_string())
}

/// Reduce a client-supplied filename to a single safe path component.
fn safe_file_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("invoice.pdf"), "invoice.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("my invoice (1).pdf"), "my_invoice__1_.pdf");
        assert_eq!(safe_file_name(""), "document.pdf");
        assert_eq!(safe_file_name(".."), "document.pdf");
    }

    #[tokio::test]
    async fn test_save_writes_file_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let doc = store.save("scan.pdf", b"%PDF-1.4 test").await.unwrap();

        assert!(doc.file.starts_with(dir.path().join("uploads")));
        assert!(doc.file.to_string_lossy().ends_with("_scan.pdf"));
        assert_eq!(std::fs::read(&doc.file).unwrap(), b"%PDF-1.4 test");
        assert_eq!(doc.size, 13);
        assert_eq!(doc.sha256.len(), 64);

        let loaded = store.load(&doc.id).await.unwrap();
        assert_eq!(loaded.id, doc.id);
        assert_eq!(loaded.file, doc.file);
        assert_eq!(loaded.original_name, "scan.pdf");
    }

    #[tokio::test]
    async fn test_same_name_twice_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let a = store.save("a.pdf", b"one").await.unwrap();
        let b = store.save("a.pdf", b"two").await.unwrap();
        assert_ne!(a.file, b.file);
        assert_ne!(a.sha256, b.sha256);
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let id = Uuid::new_v4();
        let err = store.load(&id).await.unwrap_err();
        assert!(matches!(err, DocParserError::DocumentNotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        let doc = store.save("scan.pdf", b"%PDF-1.4").await.unwrap();
        std::fs::write(store.record_path(&doc.id), b"[]").unwrap();

        let err = store.load(&doc.id).await.unwrap_err();
        assert!(matches!(err, DocParserError::Storage(_)), "{}", err);
        assert!(!err.to_string().contains(&*dir.path().to_string_lossy()));
    }

    #[tokio::test]
    async fn test_unwritable_root_hides_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("media");
        std::fs::write(&root, b"not a directory").unwrap();
        let store = DocumentStore::new(&root);

        let err = store.save("scan.pdf", b"%PDF-1.4").await.unwrap_err();
        assert!(matches!(err, DocParserError::Storage(_)), "{}", err);
        assert!(!err.to_string().contains(&*dir.path().to_string_lossy()));
    }
}
