//! Progress events published by the orchestrator.
//!
//! Every action emits, in order:
//!
//! ```text
//! Started → Submitted → Progress* → Completed | Failed | Cancelled
//! ```
//!
//! An action rejected locally (busy, no session, invalid parameters) emits
//! nothing. `Progress.percent` never decreases within one action.
//!
//! # Subscribing
//!
//! Events travel on a `tokio::sync::broadcast` channel, so any number of
//! presentation layers can listen. A subscriber that falls behind loses the
//! oldest events rather than stalling the action; [`event_stream`] drops the
//! resulting lag notices and yields only events.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pdf_workbench::{event_stream, Orchestrator, ProgressEvent};
//!
//! # async fn watch(orchestrator: &Orchestrator) {
//! let mut events = event_stream(orchestrator.subscribe());
//! while let Some(event) = events.next().await {
//!     if let ProgressEvent::Progress { text, .. } = &event {
//!         eprintln!("{text}");
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! # }
//! ```

use crate::action::ActionKind;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Capacity of the orchestrator's event channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One step in the life of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The action passed the single-flight check.
    Started { action: ActionKind },
    /// The service accepted the request and assigned a task id.
    Submitted { action: ActionKind, task_id: String },
    /// A non-terminal status report.
    Progress {
        action: ActionKind,
        percent: u8,
        text: String,
    },
    Completed { action: ActionKind },
    Failed { action: ActionKind, message: String },
    Cancelled { action: ActionKind },
}

impl ProgressEvent {
    pub fn action(&self) -> ActionKind {
        match self {
            ProgressEvent::Started { action }
            | ProgressEvent::Submitted { action, .. }
            | ProgressEvent::Progress { action, .. }
            | ProgressEvent::Completed { action }
            | ProgressEvent::Failed { action, .. }
            | ProgressEvent::Cancelled { action } => *action,
        }
    }

    /// `true` for the last event an action emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. }
                | ProgressEvent::Failed { .. }
                | ProgressEvent::Cancelled { .. }
        )
    }
}

/// Adapt a broadcast receiver into a stream of events, skipping lag notices.
pub fn event_stream(
    receiver: broadcast::Receiver<ProgressEvent>,
) -> impl Stream<Item = ProgressEvent> + Send + Unpin {
    BroadcastStream::new(receiver).filter_map(|item| futures::future::ready(item.ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_yields_events_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut events = event_stream(rx);
        tx.send(ProgressEvent::Started {
            action: ActionKind::Encrypt,
        })
        .unwrap();
        tx.send(ProgressEvent::Completed {
            action: ActionKind::Encrypt,
        })
        .unwrap();
        drop(tx);

        let first = events.next().await.unwrap();
        assert!(!first.is_terminal());
        let last = events.next().await.unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.action(), ActionKind::Encrypt);
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_lost_events() {
        let (tx, rx) = broadcast::channel(2);
        let mut events = event_stream(rx);
        for percent in [10, 20, 30, 40] {
            tx.send(ProgressEvent::Progress {
                action: ActionKind::ExtractText,
                percent,
                text: ActionKind::ExtractText.status_text(percent),
            })
            .unwrap();
        }
        drop(tx);

        let seen: Vec<ProgressEvent> = events.by_ref().collect().await;
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], ProgressEvent::Progress { percent: 30, .. }));
    }

    #[test]
    fn events_serialize_with_tag() {
        let e = ProgressEvent::Failed {
            action: ActionKind::Decrypt,
            message: "bad password".into(),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({"event": "failed", "action": "decrypt", "message": "bad password"})
        );
    }
}
