//! Notification trigger for effective status changes.
//!
//! The workflow engine calls [`NotificationTrigger::notify`] exactly once after a
//! status change has been committed and re-read. Delivery (mail, chat, retries) is
//! the implementation's business; from the engine's side the call is
//! fire-and-forget, and an error is simply handed back to the caller.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Result, TravelflowError};
use crate::request::{RequestId, Status, TravelRequest, UserId};

/// Trait for reacting to committed status changes.
///
/// # Example
/// ```ignore
/// let notifier = LogNotifier::default();
/// notifier.notify(&approved_request, Status::Requested).await?;
/// ```
#[async_trait]
pub trait NotificationTrigger: Send + Sync {
    /// Called with the committed request and the status it held before.
    async fn notify(&self, request: &TravelRequest, previous_status: Status) -> Result<()>;
}

/// Settings for the bundled notifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// Capacity of the queue behind [`QueueNotifier`]
    pub buffer_size: usize,

    /// Closing line of rendered status change notices
    pub signature: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            signature: "Corporate Travel Team".to_string(),
        }
    }
}

/// Rendered message telling a request owner their request changed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChangeNotice {
    pub request_id: RequestId,
    pub recipient: UserId,
    pub previous_status: Status,
    pub current_status: Status,
    pub subject: String,
    pub lines: Vec<String>,
}

impl StatusChangeNotice {
    pub fn new(request: &TravelRequest, previous_status: Status, signature: &str) -> Self {
        let data = &request.data;
        let lines = vec![
            format!("Hello {},", data.requester_name),
            format!(
                "The status of your travel request to {} changed from {} to {}.",
                data.destination,
                previous_status,
                request.status()
            ),
            "Dates:".to_string(),
            format!(" • Departure: {}", format_date(data.departure_date)),
            format!(" • Return: {}", format_date(data.return_date)),
            "If you have any questions, please contact the travel team.".to_string(),
            signature.to_string(),
        ];

        Self {
            request_id: request.id(),
            recipient: request.owner(),
            previous_status,
            current_status: request.status(),
            subject: format!("Travel request #{} status updated", request.id().0),
            lines,
        }
    }

    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// ============================================================================
// Production Implementations
// ============================================================================

/// Notifier that only writes the notice to the log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    signature: String,
}

impl LogNotifier {
    pub fn new(config: &NoticeConfig) -> Self {
        Self {
            signature: config.signature.clone(),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(&NoticeConfig::default())
    }
}

#[async_trait]
impl NotificationTrigger for LogNotifier {
    async fn notify(&self, request: &TravelRequest, previous_status: Status) -> Result<()> {
        let notice = StatusChangeNotice::new(request, previous_status, &self.signature);
        tracing::info!(
            request_id = %notice.request_id,
            recipient = %notice.recipient,
            from = %notice.previous_status,
            to = %notice.current_status,
            subject = %notice.subject,
            "Travel request status changed"
        );
        Ok(())
    }
}

/// Notifier that hands notices to a delivery worker over a bounded queue.
///
/// Enqueueing never waits: a full or closed queue is reported as a notification
/// failure rather than stalling the transition.
#[derive(Debug, Clone)]
pub struct QueueNotifier {
    tx: mpsc::Sender<StatusChangeNotice>,
    signature: String,
}

impl QueueNotifier {
    /// Create a notifier and the receiving end for the delivery worker.
    pub fn channel(config: &NoticeConfig) -> (Self, mpsc::Receiver<StatusChangeNotice>) {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        (
            Self {
                tx,
                signature: config.signature.clone(),
            },
            rx,
        )
    }
}

#[async_trait]
impl NotificationTrigger for QueueNotifier {
    async fn notify(&self, request: &TravelRequest, previous_status: Status) -> Result<()> {
        let notice = StatusChangeNotice::new(request, previous_status, &self.signature);
        self.tx.try_send(notice).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "notification queue is full",
                mpsc::error::TrySendError::Closed(_) => "notification queue is closed",
            };
            TravelflowError::Notification(anyhow::anyhow!(
                "{} (request {})",
                reason,
                request.id()
            ))
        })?;
        tracing::debug!(request_id = %request.id(), "Queued status change notice");
        Ok(())
    }
}

// ============================================================================
// Test/Recording Implementation
// ============================================================================

/// Record of a call made to the recording notifier.
#[derive(Debug, Clone)]
pub struct NotificationCall {
    pub request: TravelRequest,
    pub previous_status: Status,
}

/// Notifier for tests: records every call and can be told to fail.
///
/// # Example
/// ```ignore
/// let notifier = RecordingNotifier::new();
/// notifier.fail_next("smtp unavailable");
/// ```
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<NotificationCall>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `notify` call fail with `message`. Failures queue up in FIFO order.
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    /// Get all calls that have been made to this notifier.
    pub fn get_calls(&self) -> Vec<NotificationCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl NotificationTrigger for RecordingNotifier {
    async fn notify(&self, request: &TravelRequest, previous_status: Status) -> Result<()> {
        // Failed attempts are recorded too: the engine did trigger them
        self.calls.lock().push(NotificationCall {
            request: request.clone(),
            previous_status,
        });

        match self.failures.lock().pop_front() {
            Some(message) => Err(TravelflowError::Notification(anyhow::anyhow!(message))),
            None => Ok(()),
        }
    }
}
