//! # pdf-workbench
//!
//! Client for a remote PDF processing service: upload a document, preview
//! its pages, and run long-running transformations (text, table and image
//! extraction, rotation, page deletion, encryption, conversion to Word)
//! through the service's submit → poll → result task protocol.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator ── run(Action) ──────────────────────────────┐
//!  │  single flight, phase machine, ProgressEvent broadcast │
//!  │                                                        │
//!  ├─ session   active FileSession, page navigation         │
//!  ├─ action    Action → ActionRequest bound to file_id     │
//!  ├─ poller    poll_task: wait → status → report, backoff  │
//!  ├─ outcome   COMPLETED result → ActionOutcome            │
//!  └─ service   PdfService trait ── transport::ApiClient ───┘── HTTP
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_workbench::{Action, ApiClient, ClientConfig, Orchestrator, UploadFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://127.0.0.1:5000/api")
//!         .build()?;
//!     let client = Arc::new(ApiClient::new(&config)?);
//!     let workbench = Orchestrator::new(client, config);
//!
//!     let file = UploadFile::from_path("report.pdf".as_ref()).await?;
//!     let session = workbench.upload(file).await?;
//!     eprintln!("{} pages", session.page_count);
//!
//!     let outcome = workbench.run(Action::ExtractText { pages: vec![] }).await?;
//!     println!("{}", outcome.render());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfwb` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-workbench = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod action;
pub mod config;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod poller;
pub mod progress;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use action::{Action, ActionKind, ActionRequest, Rotation};
pub use config::{ClientConfig, ClientConfigBuilder, PollPolicy, DEFAULT_BASE_URL, MAX_UPLOAD_BYTES};
pub use download::save_download;
pub use error::{ErrorKind, ValidationError, WorkbenchError};
pub use orchestrator::{Orchestrator, Phase};
pub use outcome::{ActionOutcome, DownloadTarget};
pub use poller::poll_task;
pub use progress::{event_stream, ProgressEvent};
pub use service::{PdfService, UploadFile};
pub use session::{validate_upload, FileSession, SessionManager};
pub use transport::ApiClient;
pub use types::{HealthReport, ServerSettings, SettingsPatch, TaskState, TaskStatus, UploadInfo};
