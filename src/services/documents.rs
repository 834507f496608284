//! Proof-document validation and out-of-band storage.
//!
//! Only the generated file name is persisted with the applicant; the bytes
//! live in the upload directory.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("Proof document is required")]
    Missing,

    #[error("Proof document is empty")]
    Empty,

    #[error("Unsupported document format (accepted: pdf, jpg, jpeg, png)")]
    UnsupportedFormat,

    #[error("Proof document exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Failed to store document: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded proof document, not yet stored
#[derive(Debug, Clone)]
pub struct ProofDocument {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProofDocument {
    /// Lower-cased extension of the uploaded file name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Both the extension and the declared content type must name an
    /// accepted format.
    pub fn validate(&self, max_bytes: usize) -> Result<(), DocumentError> {
        if self.bytes.is_empty() {
            return Err(DocumentError::Empty);
        }
        if self.bytes.len() > max_bytes {
            return Err(DocumentError::TooLarge { limit: max_bytes });
        }

        let extension_ok = self
            .extension()
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
        let content_type = self.content_type.to_ascii_lowercase();
        let mime_ok = ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| content_type.contains(allowed));

        if extension_ok && mime_ok {
            Ok(())
        } else {
            Err(DocumentError::UnsupportedFormat)
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn max_bytes(&self) -> usize;

    /// Persists a validated document and returns its reference.
    async fn save(&self, document: &ProofDocument) -> Result<String, DocumentError>;

    /// Best-effort removal of a document whose owner was never created
    async fn discard(&self, reference: &str);
}

/// Stores documents as files under one directory
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn path_for(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }
}

/// `<millis>-<random>.<ext>`
fn unique_name(extension: &str) -> String {
    let random = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("{}-{}.{}", Utc::now().timestamp_millis(), random, extension)
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[tracing::instrument(
        skip(self, document),
        fields(file_name = %document.file_name, size = document.bytes.len())
    )]
    async fn save(&self, document: &ProofDocument) -> Result<String, DocumentError> {
        document.validate(self.max_bytes)?;

        let extension = document.extension().ok_or(DocumentError::UnsupportedFormat)?;
        let reference = unique_name(&extension);

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(&reference), &document.bytes).await?;

        tracing::debug!(reference = %reference, "Proof document stored");

        Ok(reference)
    }

    async fn discard(&self, reference: &str) {
        if let Err(e) = tokio::fs::remove_file(self.path_for(reference)).await {
            tracing::warn!(reference = %reference, error = %e, "Failed to discard proof document");
        }
    }
}
