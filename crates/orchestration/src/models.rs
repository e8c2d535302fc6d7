//! Request and response shapes for engine operations.

use campaign_core::audience::AudienceRequest;
use campaign_core::types::{
    Campaign, CampaignCounters, CampaignRecipient, CampaignStatus, RecipientStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Campaigns ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub message_template: String,
    #[serde(default)]
    pub audience: AudienceRequest,
    #[serde(default)]
    pub frequency_cap_days: Option<u32>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub message_template: Option<String>,
    pub audience: Option<AudienceRequest>,
    pub frequency_cap_days: Option<u32>,
    /// Remove an existing frequency cap.
    #[serde(default)]
    pub clear_frequency_cap: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Remove an existing schedule; a scheduled campaign returns to draft.
    #[serde(default)]
    pub clear_schedule: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PreviewAudienceRequest {
    #[serde(default)]
    pub audience: AudienceRequest,
    #[serde(default)]
    pub frequency_cap_days: Option<u32>,
}

// ─── Recipients ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecipientQuery {
    pub status: Option<RecipientStatus>,
    pub page: Option<usize>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<usize>,
}

/// A ledger row joined with the contact it targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientListing {
    #[serde(flatten)]
    pub recipient: CampaignRecipient,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientPage {
    pub recipients: Vec<RecipientListing>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

// ─── Worker side ───────────────────────────────────────────────────────────

/// Recipients a worker should send to next. Empty unless the campaign is
/// currently sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchBatch {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub from_number: Option<String>,
    pub message_template: String,
    pub targets: Vec<DispatchTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTarget {
    pub contact_id: Uuid,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateOutcome {
    /// False when the report was older than what the ledger already holds.
    pub applied: bool,
    pub recipient_status: RecipientStatus,
    pub campaign_status: CampaignStatus,
    pub counters: CampaignCounters,
}

// ─── Groups ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub workspace_ids: Vec<Uuid>,
    pub message_template: String,
    #[serde(default)]
    pub audience: AudienceRequest,
    #[serde(default)]
    pub frequency_cap_days: Option<u32>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// A group as one caller sees it: only children in the caller's workspaces
/// are included, and status and totals are computed from those.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: CampaignStatus,
    pub totals: CampaignCounters,
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedCampaign {
    pub campaign_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupActionResult {
    pub group: GroupView,
    pub affected: Vec<Uuid>,
    pub skipped: Vec<SkippedCampaign>,
}
