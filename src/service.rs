//! The seam between task orchestration and the remote service.
//!
//! [`PdfService`] covers exactly what the poller and orchestrator need:
//! upload a document, submit an action, read a task's status. The HTTP
//! implementation is [`crate::transport::ApiClient`].

use crate::action::ActionRequest;
use crate::error::WorkbenchError;
use crate::types::{TaskStatus, UploadInfo};
use async_trait::async_trait;
use std::path::Path;

/// A document selected for upload, held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its final path component as the
    /// upload name.
    pub async fn from_path(path: &Path) -> Result<Self, WorkbenchError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| WorkbenchError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Operations the orchestration layer performs against the service.
#[async_trait]
pub trait PdfService: Send + Sync {
    /// API base URL, used to build preview and download links.
    fn base_url(&self) -> &str;

    /// Upload a document and return the service's description of it.
    async fn upload(&self, file: &UploadFile) -> Result<UploadInfo, WorkbenchError>;

    /// Submit an action and return the id of the task running it.
    async fn submit(&self, request: &ActionRequest) -> Result<String, WorkbenchError>;

    /// One status query for a task.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, WorkbenchError>;
}
