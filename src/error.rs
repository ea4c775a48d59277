//! Error types for the pdf-workbench library.
//!
//! Every failure an action can hit is a [`WorkbenchError`]. The variants are
//! grouped by *where* the failure happened, and [`WorkbenchError::kind`]
//! collapses them into the four categories a presentation layer cares about:
//!
//! * [`ErrorKind::LocalValidation`]: rejected before any network call
//!   (wrong file type, file too large, page out of range, no session).
//! * [`ErrorKind::Transport`]: the HTTP exchange itself failed (non-2xx,
//!   timeout, connection refused, undecodable body), or the task never
//!   reached a terminal state before the poll deadline.
//! * [`ErrorKind::TaskFailure`]: the service ran the task and reported
//!   `FAILED`.
//! * [`ErrorKind::UnexpectedResult`]: the task reported `COMPLETED` but the
//!   result is missing a field the action needs.
//!
//! Nothing here is retried automatically and nothing is fatal: after any
//! error the orchestrator is back in its idle state.

use std::path::PathBuf;
use thiserror::Error;

/// Violations detected locally, before anything is sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The selected file does not carry a `.pdf` extension.
    #[error("'{filename}' is not a PDF file\nOnly files with a .pdf extension can be uploaded.")]
    NotAPdf { filename: String },

    /// The selected file exceeds the upload limit.
    #[error("'{filename}' is {size} bytes, which exceeds the {limit}-byte upload limit")]
    FileTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    /// The selected file has no content.
    #[error("'{filename}' is empty")]
    EmptyFile { filename: String },

    /// An action was requested but no document has been uploaded.
    #[error("No document is loaded.\nUpload a PDF before running an action.")]
    NoActiveSession,

    /// A page number falls outside the loaded document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    /// An action that needs at least one page got none.
    #[error("{action} needs at least one page")]
    EmptyPageList { action: String },

    /// Rotation angles are limited to quarter turns.
    #[error("Invalid rotation angle {angle}: expected 90, 180 or 270")]
    InvalidRotation { angle: i64 },

    /// A password field was left empty.
    #[error("{field} must not be empty")]
    EmptyPassword { field: &'static str },
}

/// All errors returned by the pdf-workbench library.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    // ── Local errors ──────────────────────────────────────────────────────
    /// Pre-submission check failed; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another action currently occupies the orchestrator.
    #[error("'{running}' is still in progress; wait for it to finish or reset")]
    Busy { running: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The service answered with a non-success status.
    ///
    /// `message` is the service's `error` field when the body carried one,
    /// otherwise `HTTP <status>`.
    #[error("Request to '{path}' failed ({status}): {message}")]
    Http {
        path: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, refused connection, TLS).
    #[error("Could not reach the PDF service at '{url}': {reason}\nCheck the service is running and --base-url is correct.")]
    Network { url: String, reason: String },

    /// The request exceeded its configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    RequestTimeout { url: String, secs: u64 },

    /// A success response whose body did not match the expected shape.
    #[error("Malformed response from '{path}': {detail}")]
    MalformedResponse { path: String, detail: String },

    // ── Task errors ───────────────────────────────────────────────────────
    /// The service reported a terminal `FAILED` status.
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// A completed task's result lacks something the action depends on.
    #[error("{action} completed but the result is unusable: {detail}")]
    UnexpectedResult { action: String, detail: String },

    /// Polling was stopped through its cancellation token.
    #[error("Task {task_id} was cancelled before it finished")]
    Cancelled { task_id: String },

    /// Polling ran past the configured deadline.
    #[error("Task {task_id} did not finish within {secs}s\nIncrease --poll-timeout for long conversions.")]
    PollTimeout { task_id: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading an upload or writing a download failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LocalValidation,
    Transport,
    TaskFailure,
    UnexpectedResult,
    Cancelled,
    Other,
}

impl WorkbenchError {
    /// Which of the error categories this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkbenchError::Validation(_) | WorkbenchError::Busy { .. } => {
                ErrorKind::LocalValidation
            }
            WorkbenchError::Http { .. }
            | WorkbenchError::Network { .. }
            | WorkbenchError::RequestTimeout { .. }
            | WorkbenchError::MalformedResponse { .. }
            | WorkbenchError::PollTimeout { .. } => ErrorKind::Transport,
            WorkbenchError::TaskFailed { .. } => ErrorKind::TaskFailure,
            WorkbenchError::UnexpectedResult { .. } => ErrorKind::UnexpectedResult,
            WorkbenchError::Cancelled { .. } => ErrorKind::Cancelled,
            WorkbenchError::Io { .. }
            | WorkbenchError::InvalidConfig(_)
            | WorkbenchError::Internal(_) => ErrorKind::Other,
        }
    }

    /// HTTP status attached to the failure, if the service answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            WorkbenchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn unexpected(action: impl Into<String>, detail: impl Into<String>) -> Self {
        WorkbenchError::UnexpectedResult {
            action: action.into(),
            detail: detail.into(),
        }
    }
}
