//! Task status polling.
//!
//! [`poll_task`] drives one server-side task to a terminal state. It is a
//! single sequential loop: wait, query, report, repeat. A tick's wait is
//! armed only after the previous status request and progress callback have
//! returned, so slow responses stretch the cadence instead of stacking
//! requests.
//!
//! ## Timing
//!
//! The first query happens one interval after the call. Waits then follow
//! [`PollPolicy`]: flat progress backs the interval off, advancing progress
//! snaps it back to the base interval. Past the policy's deadline the loop
//! gives up with [`WorkbenchError::PollTimeout`].
//!
//! ## Settlement
//!
//! The function returns exactly once:
//!
//! | Status / event     | Return                                            |
//! |--------------------|---------------------------------------------------|
//! | `COMPLETED`        | `Ok(result)`, `Value::Null` when absent            |
//! | `FAILED`           | `Err(TaskFailed)` with the service's message       |
//! | transport failure  | that error, unchanged (no retry)                   |
//! | token cancelled    | `Err(Cancelled)`                                   |
//! | deadline passed    | `Err(PollTimeout)`                                 |

use crate::config::PollPolicy;
use crate::error::WorkbenchError;
use crate::service::PdfService;
use crate::types::{TaskState, TaskStatus};
use serde_json::Value;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll `task_id` until it settles.
///
/// `on_progress` sees every `PENDING`/`RUNNING` report in order. The
/// `progress` it sees never decreases: a report lower than an earlier one
/// is raised to the earlier maximum.
pub async fn poll_task<S, F>(
    service: &S,
    task_id: &str,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<Value, WorkbenchError>
where
    S: PdfService + ?Sized,
    F: FnMut(&TaskStatus),
{
    let started = Instant::now();
    let deadline = policy.max_duration().map(|d| started + d);
    let mut wait = policy.interval();
    let mut reported: u8 = 0;

    loop {
        let mut wake = Instant::now() + wait;
        if let Some(deadline) = deadline {
            wake = wake.min(deadline);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(task_id)),
            _ = sleep_until(wake) => {}
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            let secs = policy.max_duration_secs.unwrap_or_default();
            warn!("Task {} still unfinished after {}s, giving up", task_id, secs);
            return Err(WorkbenchError::PollTimeout {
                task_id: task_id.to_string(),
                secs,
            });
        }

        let mut status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(task_id)),
            status = service.task_status(task_id) => status?,
        };
        debug!(
            "Task {}: {} {}%",
            task_id,
            status.status.as_str(),
            status.progress
        );

        match status.status {
            TaskState::Completed => {
                info!("Task {} completed", task_id);
                return Ok(status.result.unwrap_or(Value::Null));
            }
            TaskState::Failed => {
                let message = status
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "task failed".to_string());
                warn!("Task {} failed: {}", task_id, message);
                return Err(WorkbenchError::TaskFailed {
                    task_id: task_id.to_string(),
                    message,
                });
            }
            TaskState::Pending | TaskState::Running => {
                let advanced = status.progress > reported;
                reported = reported.max(status.progress);
                status.progress = reported;
                on_progress(&status);
                wait = if advanced {
                    policy.interval()
                } else {
                    policy.next_interval(wait)
                };
            }
        }
    }
}

fn cancelled(task_id: &str) -> WorkbenchError {
    debug!("Polling of task {} cancelled", task_id);
    WorkbenchError::Cancelled {
        task_id: task_id.to_string(),
    }
}
