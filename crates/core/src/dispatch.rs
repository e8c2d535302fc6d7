//! Dispatch handoff: the boundary to the asynchronous send workers.
//!
//! The engine accepts an `Arc<dyn DispatchQueue>` and enqueues one
//! [`DispatchEvent`] per launch/resume. Implementations publish to NATS
//! (see `campaign-dispatch`) or capture events in memory for tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CampaignResult;
use crate::types::RecipientStatus;

/// Trigger telling the worker pool a campaign has pending recipients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchEvent {
    pub event_id: Uuid,
    pub campaign_id: Uuid,
    pub workspace_id: Uuid,
    pub reason: DispatchReason,
    pub pending_recipients: u64,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchReason {
    Launch,
    Resume,
}

impl DispatchEvent {
    pub fn new(
        campaign_id: Uuid,
        workspace_id: Uuid,
        reason: DispatchReason,
        pending_recipients: u64,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            campaign_id,
            workspace_id,
            reason,
            pending_recipients,
            enqueued_at: Utc::now(),
        }
    }
}

/// Status report written back by a worker for a single recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientStatusUpdate {
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub status: RecipientStatus,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Fire-and-forget queue towards the send workers. Enqueueing must not
/// block on the workers.
pub trait DispatchQueue: Send + Sync {
    fn enqueue(&self, event: DispatchEvent) -> CampaignResult<()>;
}

/// Drops every event. For deployments without workers and for tests that
/// do not care.
pub struct NoOpDispatch;

impl DispatchQueue for NoOpDispatch {
    fn enqueue(&self, _event: DispatchEvent) -> CampaignResult<()> {
        Ok(())
    }
}

/// In-memory queue that records enqueued events.
#[derive(Default)]
pub struct CaptureDispatch {
    events: Mutex<Vec<DispatchEvent>>,
}

impl CaptureDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_for(&self, campaign_id: Uuid) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.campaign_id == campaign_id)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DispatchQueue for CaptureDispatch {
    fn enqueue(&self, event: DispatchEvent) -> CampaignResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

pub fn noop_dispatch() -> Arc<dyn DispatchQueue> {
    Arc::new(NoOpDispatch)
}

pub fn capture_dispatch() -> Arc<CaptureDispatch> {
    Arc::new(CaptureDispatch::new())
}
