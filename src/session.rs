//! The currently loaded document.
//!
//! At most one [`FileSession`] is active. A successful upload replaces it
//! wholesale; reset clears it. Every action targets the active session.

use crate::error::ValidationError;
use crate::transport::preview_url;
use crate::types::UploadInfo;
use serde::Serialize;

/// A document the service has accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSession {
    pub file_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub page_count: u32,
    pub is_encrypted: bool,
    /// Page shown in the preview, 1-indexed.
    pub current_page: u32,
}

impl FileSession {
    pub fn from_upload(info: UploadInfo) -> Self {
        Self {
            file_id: info.file_id,
            filename: info.filename,
            size_bytes: info.size,
            page_count: info.pages,
            is_encrypted: info.is_encrypted,
            current_page: 1,
        }
    }

    /// Preview URL for [`Self::current_page`].
    pub fn preview_url(&self, base_url: &str) -> String {
        preview_url(base_url, &self.file_id, self.current_page)
    }

    fn contains_page(&self, page: u32) -> bool {
        page >= 1 && page <= self.page_count
    }
}

/// Holder of the single active session.
#[derive(Debug, Default)]
pub struct SessionManager {
    active: Option<FileSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any existing session with one built from `info`.
    pub fn adopt_upload(&mut self, info: UploadInfo) -> &FileSession {
        self.active.insert(FileSession::from_upload(info))
    }

    pub fn current(&self) -> Option<&FileSession> {
        self.active.as_ref()
    }

    /// The active session, or [`ValidationError::NoActiveSession`].
    pub fn require(&self) -> Result<&FileSession, ValidationError> {
        self.active.as_ref().ok_or(ValidationError::NoActiveSession)
    }

    /// Move the preview to `page`. Returns `false`, changing nothing, when
    /// there is no session or the page is outside the document.
    pub fn set_current_page(&mut self, page: u32) -> bool {
        match self.active.as_mut() {
            Some(s) if s.contains_page(page) => {
                s.current_page = page;
                true
            }
            _ => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        match self.active.as_ref().map(|s| s.current_page.saturating_add(1)) {
            Some(page) => self.set_current_page(page),
            None => false,
        }
    }

    pub fn prev_page(&mut self) -> bool {
        match self.active.as_ref().map(|s| s.current_page.saturating_sub(1)) {
            Some(page) => self.set_current_page(page),
            None => false,
        }
    }

    /// Drop the session. Calling it again is a no-op.
    pub fn reset(&mut self) {
        self.active = None;
    }
}

/// Checks run on a file before it may be uploaded.
///
/// The name must end in `.pdf` in any letter case (a bare `.pdf` counts)
/// and the size must be within `1..=limit` bytes.
pub fn validate_upload(filename: &str, size: u64, limit: u64) -> Result<(), ValidationError> {
    let is_pdf = filename.to_ascii_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(ValidationError::NotAPdf {
            filename: filename.to_string(),
        });
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile {
            filename: filename.to_string(),
        });
    }
    if size > limit {
        return Err(ValidationError::FileTooLarge {
            filename: filename.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}
