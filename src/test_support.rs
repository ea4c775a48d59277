//! In-memory [`PdfService`] used by the poller and orchestrator unit tests.

use crate::action::{Action, ActionRequest};
use crate::error::WorkbenchError;
use crate::service::{PdfService, UploadFile};
use crate::types::{TaskState, TaskStatus, UploadInfo};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

pub(crate) fn status(state: TaskState, progress: u8) -> TaskStatus {
    TaskStatus {
        task_id: None,
        status: state,
        progress,
        result: None,
        error: None,
    }
}

pub(crate) fn completed(result: Value) -> TaskStatus {
    TaskStatus {
        result: Some(result),
        ..status(TaskState::Completed, 100)
    }
}

pub(crate) fn failed(error: Option<&str>) -> TaskStatus {
    TaskStatus {
        error: error.map(str::to_string),
        ..status(TaskState::Failed, 0)
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub upload_calls: usize,
    pub submitted: Vec<ActionRequest>,
    pub status_calls: usize,
    /// One status script per future submission, consumed in order.
    pub scripts: VecDeque<Vec<Result<TaskStatus, WorkbenchError>>>,
    current: VecDeque<Result<TaskStatus, WorkbenchError>>,
    /// Accumulated rotation per page, composed additively mod 360.
    pub page_rotation: BTreeMap<u32, u16>,
    pub fail_submit: Option<WorkbenchError>,
}

/// Scripted service. When a task's script runs out it stays `RUNNING`
/// forever, which keeps an action in flight for busy/cancel tests.
pub(crate) struct FakeService {
    pub pages: u32,
    pub state: Mutex<FakeState>,
}

impl FakeService {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_script(self, script: Vec<TaskStatus>) -> Self {
        self.push_script(script);
        self
    }

    pub fn push_script(&self, script: Vec<TaskStatus>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .push_back(script.into_iter().map(Ok).collect());
    }

    /// Make `script` the status sequence of the task already in flight.
    pub fn start_task(&self, script: Vec<Result<TaskStatus, WorkbenchError>>) {
        self.state.lock().unwrap().current = script.into();
    }

    pub fn upload_calls(&self) -> usize {
        self.state.lock().unwrap().upload_calls
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn rotation_of(&self, page: u32) -> u16 {
        self.state
            .lock()
            .unwrap()
            .page_rotation
            .get(&page)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PdfService for FakeService {
    fn base_url(&self) -> &str {
        "http://fake/api"
    }

    async fn upload(&self, file: &UploadFile) -> Result<UploadInfo, WorkbenchError> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        Ok(UploadInfo {
            file_id: format!("file-{}", state.upload_calls),
            filename: file.filename.clone(),
            size: file.size(),
            pages: self.pages,
            is_encrypted: false,
        })
    }

    async fn submit(&self, request: &ActionRequest) -> Result<String, WorkbenchError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_submit.take() {
            return Err(err);
        }
        state.submitted.push(request.clone());
        if let Action::RotatePages { rotations } = &request.action {
            for (page, r) in rotations {
                let entry = state.page_rotation.entry(*page).or_insert(0);
                *entry = (*entry + r.degrees()) % 360;
            }
        }
        let script = match state.scripts.pop_front() {
            Some(script) => script,
            None => match &request.action {
                Action::RotatePages { rotations } => vec![Ok(completed(
                    json!({"output_file_id": "rotated-1", "rotated_pages": rotations.len()}),
                ))],
                _ => Vec::new(),
            },
        };
        state.current = script.into();
        Ok(format!("task-{}", state.submitted.len()))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, WorkbenchError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let next = state
            .current
            .pop_front()
            .unwrap_or_else(|| Ok(status(TaskState::Running, 50)));
        next.map(|mut s| {
            s.task_id = Some(task_id.to_string());
            s
        })
    }
}
