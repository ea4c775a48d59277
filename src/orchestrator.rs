//! Action orchestration: the state machine behind every tool action.
//!
//! ```text
//!            run(action)                 {task_id}
//!   IDLE ───────────────► SUBMITTING ───────────────► POLLING
//!    ▲                                                   │
//!    │                       COMPLETED                   │ FAILED / error
//!    ├──────────── RENDERING_RESULT ◄────────────────────┤
//!    │                                                   ▼
//!    └──────────────────────────────────────────────── FAILED
//! ```
//!
//! The orchestrator owns the application state (active session, phase,
//! cancellation token of the action in flight) behind a `std::sync::Mutex`
//! that is never held across an `.await`.
//!
//! ## Single flight
//!
//! Only one upload or action runs at a time. A second one started while
//! the machine is not idle fails immediately with
//! [`WorkbenchError::Busy`] without touching the network.
//!
//! ## Reset
//!
//! [`Orchestrator::reset`] cancels whatever is in flight, clears the
//! session and puts the machine back to idle at once. The cancelled action
//! still unwinds on its own task and reports
//! [`WorkbenchError::Cancelled`]; a generation counter keeps its late
//! cleanup from touching state that now belongs to newer work.

use crate::action::{Action, ActionRequest};
use crate::config::ClientConfig;
use crate::error::WorkbenchError;
use crate::outcome::{interpret, ActionOutcome};
use crate::poller::poll_task;
use crate::progress::{ProgressEvent, EVENT_CHANNEL_CAPACITY};
use crate::service::{PdfService, UploadFile};
use crate::session::{validate_upload, FileSession, SessionManager};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where the orchestrator is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Idle,
    Uploading,
    Submitting,
    Polling,
    RenderingResult,
    Failed,
}

#[derive(Debug)]
struct AppState {
    session: SessionManager,
    phase: Phase,
    /// Label of the operation occupying the machine.
    running: Option<String>,
    cancel: Option<CancellationToken>,
    /// Bumped whenever an operation starts or the state is reset.
    generation: u64,
}

impl AppState {
    fn new() -> Self {
        Self {
            session: SessionManager::new(),
            phase: Phase::Idle,
            running: None,
            cancel: None,
            generation: 0,
        }
    }

    fn ensure_idle(&self) -> Result<(), WorkbenchError> {
        if self.phase == Phase::Idle {
            return Ok(());
        }
        let running = self.running.clone().unwrap_or_else(|| "an operation".into());
        warn!("Rejected new work: '{}' is still running", running);
        Err(WorkbenchError::Busy { running })
    }

    /// Occupy the machine; returns the new generation and token.
    fn occupy(&mut self, label: String, phase: Phase) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        self.generation += 1;
        self.phase = phase;
        self.running = Some(label);
        self.cancel = Some(token.clone());
        (self.generation, token)
    }
}

/// Returns the machine to idle when an operation ends, however it ends
/// (including the caller dropping the future).
struct Occupancy<'a> {
    state: &'a Mutex<AppState>,
    generation: u64,
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            state.phase = Phase::Idle;
            state.running = None;
            state.cancel = None;
        }
    }
}

/// Runs uploads and actions against a [`PdfService`].
///
/// Cheap to share: wrap it in an `Arc` to drive it from several tasks.
pub struct Orchestrator {
    service: Arc<dyn PdfService>,
    config: ClientConfig,
    state: Mutex<AppState>,
    events: broadcast::Sender<ProgressEvent>,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn PdfService>, config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            config,
            state: Mutex::new(AppState::new()),
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receive [`ProgressEvent`]s for every action started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Snapshot of the active session.
    pub fn session(&self) -> Option<FileSession> {
        self.lock().session.current().cloned()
    }

    /// Preview URL of the active session's current page.
    pub fn preview_url(&self) -> Option<String> {
        self.lock()
            .session
            .current()
            .map(|s| s.preview_url(self.service.base_url()))
    }

    pub fn set_current_page(&self, page: u32) -> bool {
        self.lock().session.set_current_page(page)
    }

    pub fn next_page(&self) -> bool {
        self.lock().session.next_page()
    }

    pub fn prev_page(&self) -> bool {
        self.lock().session.prev_page()
    }

    /// Cancel any in-flight work and clear the session. Idempotent.
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(token) = state.cancel.take() {
            info!("Reset: cancelling '{}'", state.running.as_deref().unwrap_or("?"));
            token.cancel();
        }
        state.session.reset();
        state.generation += 1;
        state.phase = Phase::Idle;
        state.running = None;
    }

    /// Validate `file` locally, upload it and make it the active session.
    ///
    /// Type and size violations fail before any request is made. A failed
    /// upload leaves the previous session in place.
    pub async fn upload(&self, file: UploadFile) -> Result<FileSession, WorkbenchError> {
        let (generation, cancel) = {
            let mut state = self.lock();
            state.ensure_idle()?;
            validate_upload(&file.filename, file.size(), self.config.max_upload_bytes)?;
            state.occupy(format!("upload of '{}'", file.filename), Phase::Uploading)
        };
        let _occupancy = Occupancy {
            state: &self.state,
            generation,
        };

        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WorkbenchError::Cancelled { task_id: "upload".into() });
            }
            info = self.service.upload(&file) => info?,
        };

        let mut state = self.lock();
        if state.generation != generation {
            return Err(WorkbenchError::Cancelled {
                task_id: "upload".into(),
            });
        }
        let session = state.session.adopt_upload(info).clone();
        info!(
            "Loaded '{}' ({} pages, {} bytes) as {}",
            session.filename, session.page_count, session.size_bytes, session.file_id
        );
        Ok(session)
    }

    /// Run one action against the active session.
    ///
    /// Emits [`ProgressEvent`]s along the way. Local rejections (busy, no
    /// session, invalid parameters) emit nothing.
    pub async fn run(&self, action: Action) -> Result<ActionOutcome, WorkbenchError> {
        let kind = action.kind();
        let (generation, cancel, session, request) = {
            let mut state = self.lock();
            state.ensure_idle()?;
            let session = state.session.require()?.clone();
            action.validate(session.page_count)?;
            let request = action.bind(session.file_id.clone());
            let (generation, cancel) = state.occupy(kind.to_string(), Phase::Submitting);
            (generation, cancel, session, request)
        };
        let _occupancy = Occupancy {
            state: &self.state,
            generation,
        };
        self.emit(ProgressEvent::Started { action: kind });

        let result = self.drive(&request, &session, generation, &cancel).await;

        match &result {
            Ok(outcome) => {
                info!("{}: {}", kind, outcome.headline());
                self.emit(ProgressEvent::Completed { action: kind });
            }
            Err(WorkbenchError::Cancelled { .. }) => {
                self.emit(ProgressEvent::Cancelled { action: kind });
            }
            Err(e) => {
                self.set_phase(generation, Phase::Failed);
                warn!("{} failed: {}", kind, e);
                self.emit(ProgressEvent::Failed {
                    action: kind,
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Submit, poll and interpret one bound request.
    async fn drive(
        &self,
        request: &ActionRequest,
        session: &FileSession,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<ActionOutcome, WorkbenchError> {
        let kind = request.kind();
        let task_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(WorkbenchError::Cancelled { task_id: "(not yet assigned)".into() });
            }
            id = self.service.submit(request) => id?,
        };
        self.set_phase(generation, Phase::Polling);
        self.emit(ProgressEvent::Submitted {
            action: kind,
            task_id: task_id.clone(),
        });

        let value = poll_task(
            self.service.as_ref(),
            &task_id,
            &self.config.poll,
            cancel,
            |status| {
                self.emit(ProgressEvent::Progress {
                    action: kind,
                    percent: status.progress,
                    text: kind.status_text(status.progress),
                })
            },
        )
        .await?;

        self.set_phase(generation, Phase::RenderingResult);
        interpret(kind, value, session, self.service.base_url())
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, generation: u64, phase: Phase) {
        let mut state = self.lock();
        if state.generation == generation {
            state.phase = phase;
        }
    }

    fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Label of the operation in flight.
    pub fn running(&self) -> Option<String> {
        self.lock().running.clone()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("base_url", &self.service.base_url())
            .field("state", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, Rotation};
    use crate::config::{PollPolicy, MAX_UPLOAD_BYTES};
    use crate::error::{ErrorKind, ValidationError};
    use crate::test_support::{completed, failed, status, FakeService};
    use crate::types::TaskState;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .poll(PollPolicy::fixed(300))
            .build()
            .unwrap()
    }

    fn orchestrator(svc: &Arc<FakeService>) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(svc.clone(), config()))
    }

    async fn loaded(svc: &Arc<FakeService>) -> Arc<Orchestrator> {
        let o = orchestrator(svc);
        o.upload(UploadFile::new("report.pdf", vec![b'%'; 64]))
            .await
            .unwrap();
        o
    }

    #[tokio::test]
    async fn non_pdf_upload_never_reaches_service() {
        let svc = Arc::new(FakeService::new(3));
        let o = orchestrator(&svc);
        let err = o
            .upload(UploadFile::new("notes.txt", b"hello".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalValidation);
        assert_eq!(svc.upload_calls(), 0);
        assert_eq!(o.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn upload_size_boundary() {
        let svc = Arc::new(FakeService::new(1));
        let o = orchestrator(&svc);
        let exact = UploadFile::new("big.pdf", vec![0; MAX_UPLOAD_BYTES as usize]);
        assert!(o.upload(exact).await.is_ok());

        let over = UploadFile::new("bigger.pdf", vec![0; MAX_UPLOAD_BYTES as usize + 1]);
        let err = o.upload(over).await.unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert_eq!(svc.upload_calls(), 1);
        assert_eq!(o.session().unwrap().filename, "big.pdf");
    }

    #[tokio::test]
    async fn action_without_session_fails_locally() {
        let svc = Arc::new(FakeService::new(1));
        let o = orchestrator(&svc);
        let err = o
            .run(Action::ExtractText { pages: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Validation(ValidationError::NoActiveSession)
        ));
        assert_eq!(svc.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn extract_text_reports_progress_then_completes() {
        let svc = Arc::new(FakeService::new(3));
        svc.push_script(vec![
            status(TaskState::Pending, 0),
            status(TaskState::Running, 40),
            completed(json!({"text": {"1": "hello"}, "extracted_pages": 1})),
        ]);
        let o = loaded(&svc).await;
        let mut rx = o.subscribe();

        let outcome = o
            .run(Action::ExtractText { pages: vec![1] })
            .await
            .unwrap();
        assert!(outcome.render().contains("hello"));
        assert_eq!(o.phase(), Phase::Idle);

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        let kind = ActionKind::ExtractText;
        assert_eq!(
            events,
            vec![
                ProgressEvent::Started { action: kind },
                ProgressEvent::Submitted {
                    action: kind,
                    task_id: "task-1".into()
                },
                ProgressEvent::Progress {
                    action: kind,
                    percent: 0,
                    text: "Extracting text… 0%".into()
                },
                ProgressEvent::Progress {
                    action: kind,
                    percent: 40,
                    text: "Extracting text… 40%".into()
                },
                ProgressEvent::Completed { action: kind },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_action_is_busy_and_reset_cancels_first() {
        let svc = Arc::new(FakeService::new(3));
        let o = loaded(&svc).await;

        let first = tokio::spawn({
            let o = o.clone();
            async move { o.run(Action::ExtractTables { pages: vec![] }).await }
        });
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(o.phase(), Phase::Polling);

        let err = o
            .run(Action::ExtractText { pages: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Busy { ref running } if running == "extract-tables"));
        assert_eq!(svc.submit_calls(), 1);

        o.reset();
        let first = first.await.unwrap();
        assert_eq!(first.unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(o.phase(), Phase::Idle);
        assert!(o.session().is_none());

        let calls = svc.status_calls();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(svc.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn decrypt_wrong_password_is_task_failure() {
        let svc = Arc::new(FakeService::new(2));
        svc.push_script(vec![
            status(TaskState::Running, 20),
            failed(Some("password error")),
        ]);
        let o = loaded(&svc).await;
        let err = o
            .run(Action::Decrypt {
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TaskFailure);
        assert!(err.to_string().contains("password error"));
        assert_eq!(o.phase(), Phase::Idle);
        assert_eq!(o.session().unwrap().file_id, "file-1");
    }

    #[tokio::test(start_paused = true)]
    async fn completed_without_output_is_unexpected_result() {
        let svc = Arc::new(FakeService::new(2).with_script(vec![completed(json!({}))]));
        let o = loaded(&svc).await;
        let err = o
            .run(Action::Encrypt {
                user_password: "pw".into(),
                owner_password: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedResult);
    }

    #[tokio::test(start_paused = true)]
    async fn rotating_back_and_forth_restores_orientation() {
        let svc = Arc::new(FakeService::new(4));
        let o = loaded(&svc).await;

        let outcome = o
            .run(Action::RotatePages {
                rotations: BTreeMap::from([(2, Rotation::Deg90)]),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome.download_target().unwrap().suggested_name,
            "report_rotated.pdf"
        );
        assert_eq!(svc.rotation_of(2), 90);

        o.run(Action::RotatePages {
            rotations: BTreeMap::from([(2, Rotation::Deg270)]),
        })
        .await
        .unwrap();
        assert_eq!(svc.rotation_of(2), 0);
    }

    #[tokio::test]
    async fn out_of_range_page_is_rejected_before_submit() {
        let svc = Arc::new(FakeService::new(2));
        let o = loaded(&svc).await;
        let err = o
            .run(Action::DeletePages { pages: vec![3] })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocalValidation);
        assert_eq!(svc.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_failure_returns_to_idle_and_can_retry() {
        let svc = Arc::new(FakeService::new(2));
        let o = loaded(&svc).await;
        svc.state.lock().unwrap().fail_submit = Some(WorkbenchError::Http {
            path: "/extract-text".into(),
            status: 500,
            message: "worker pool exhausted".into(),
        });
        let err = o
            .run(Action::ExtractText { pages: vec![] })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), Some(500));
        assert_eq!(o.phase(), Phase::Idle);

        svc.push_script(vec![completed(json!({"text": "ok", "extracted_pages": 2}))]);
        let outcome = o.run(Action::ExtractText { pages: vec![] }).await.unwrap();
        assert_eq!(outcome.render(), "ok");
    }

    #[tokio::test]
    async fn page_navigation_and_reset() {
        let svc = Arc::new(FakeService::new(3));
        let o = loaded(&svc).await;
        assert!(o.set_current_page(3));
        assert_eq!(
            o.preview_url().unwrap(),
            "http://fake/api/preview/file-1?page=3"
        );
        assert!(!o.set_current_page(4));
        assert!(o.prev_page());
        assert_eq!(o.session().unwrap().current_page, 2);

        o.reset();
        o.reset();
        assert!(o.session().is_none());
        assert!(o.preview_url().is_none());
        assert!(!o.next_page());
    }
}
