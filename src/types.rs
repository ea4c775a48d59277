//! Wire types for the PDF service's HTTP contract.
//!
//! Every struct tolerates unknown fields and defaults optional ones, so a
//! service that grows its responses does not break older clients.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Response of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub file_id: String,
    pub filename: String,
    /// Size in bytes as stored by the service.
    pub size: u64,
    /// Page count.
    pub pages: u32,
    #[serde(default)]
    pub is_encrypted: bool,
}

/// `{task_id}` returned by every task-producing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// Lifecycle state of a server-side task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    /// The service reports `PROCESSING` for running tasks as well.
    #[serde(alias = "PROCESSING")]
    Running,
    Completed,
    Failed,
}

impl TaskState {
    /// `COMPLETED` or `FAILED`; no transition follows either.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
        }
    }
}

/// Response of `GET /task-status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: TaskState,
    /// Percent complete, clamped to 0–100.
    #[serde(default, deserialize_with = "clamped_percent")]
    pub progress: u8,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

fn clamped_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(|v| v.clamp(0.0, 100.0).round() as u8).unwrap_or(0))
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub memory_usage_mb: Option<f64>,
    #[serde(default)]
    pub disk_usage: Option<DiskUsage>,
    #[serde(default)]
    pub config: Option<ServiceLimits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsage {
    #[serde(default)]
    pub free_gb: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceLimits {
    #[serde(default)]
    pub max_workers: Option<u32>,
    #[serde(default)]
    pub max_file_size_mb: Option<f64>,
    #[serde(default)]
    pub ocr_enabled: Option<bool>,
}

impl HealthReport {
    /// One-line status summary, e.g. `ready | 41.3 MB | 12.5 GB free`.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.status.clone().unwrap_or_else(|| "ready".into())];
        if let Some(mb) = self.memory_usage_mb {
            parts.push(format!("{mb:.1} MB"));
        }
        if let Some(gb) = self.disk_usage.as_ref().and_then(|d| d.free_gb) {
            parts.push(format!("{gb:.1} GB free"));
        }
        parts.join(" | ")
    }
}

/// Server-side settings exposed at `/settings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub enable_layout_preservation: bool,
    #[serde(default)]
    pub enable_ocr: bool,
    #[serde(default)]
    pub export_path: Option<String>,
}

/// Partial update for `POST /settings`; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_layout_preservation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self == &SettingsPatch::default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SettingsUpdateResponse {
    pub settings: ServerSettings,
}

/// Error body shape used by the service: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
