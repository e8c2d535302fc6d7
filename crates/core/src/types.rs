use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audience::AudienceSpec;

// ─── Workspace & Contact ──────────────────────────────────────────────────

/// A tenant location. Campaigns can only be sent from workspaces that have
/// an outbound sending number provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub outbound_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn can_send(&self) -> bool {
        self.outbound_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty())
    }
}

/// A workspace-scoped person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Leads that have not been promoted to contacts are never targeted.
    pub is_contact: bool,
    pub opted_out: bool,
    pub stage: Option<String>,
    #[serde(default)]
    pub category_ids: HashSet<Uuid>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Small projection of a contact used in previews and recipient listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
}

impl From<&Contact> for ContactSummary {
    fn from(c: &Contact) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            phone: c.phone.clone(),
        }
    }
}

// ─── Campaign ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub group_id: Option<Uuid>,
    pub name: String,
    pub message_template: String,
    pub audience: AudienceSpec,
    pub frequency_cap_days: Option<u32>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    #[serde(flatten)]
    pub counters: CampaignCounters,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running totals, always recomputed from the recipient ledger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignCounters {
    pub total_recipients: u64,
    pub sent_count: u64,
    pub delivered_count: u64,
    pub replied_count: u64,
}

impl std::ops::AddAssign for CampaignCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.total_recipients += rhs.total_recipients;
        self.sent_count += rhs.sent_count;
        self.delivered_count += rhs.delivered_count;
        self.replied_count += rhs.replied_count;
    }
}

// ─── Campaign Group ────────────────────────────────────────────────────────

/// Named container over sibling campaigns in different workspaces. Holds no
/// status of its own; see the group coordinator for the derived view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignGroup {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

// ─── Recipient Ledger ──────────────────────────────────────────────────────

/// One row per (campaign, contact).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub status: RecipientStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl CampaignRecipient {
    pub fn pending(campaign_id: Uuid, contact_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            contact_id,
            status: RecipientStatus::Pending,
            error_message: None,
            created_at: now,
            sent_at: None,
            delivered_at: None,
            replied_at: None,
            failed_at: None,
        }
    }

    /// Timestamp the frequency cap measures against: when the message left.
    pub fn send_timestamp(&self) -> Option<DateTime<Utc>> {
        self.sent_at.or(self.delivered_at).or(self.replied_at)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Delivered,
    Replied,
    Failed,
}

impl RecipientStatus {
    /// Statuses that count against a contact's frequency cap.
    pub fn counts_toward_cap(&self) -> bool {
        matches!(
            self,
            RecipientStatus::Sent | RecipientStatus::Delivered | RecipientStatus::Replied
        )
    }

    /// A recipient is settled once the worker has attempted it.
    pub fn is_settled(&self) -> bool {
        !matches!(self, RecipientStatus::Pending)
    }

    /// Whether a status report may move a row from `self` to `next`.
    /// Reports can arrive out of order, so statuses only move forward.
    pub fn can_advance_to(&self, next: RecipientStatus) -> bool {
        use RecipientStatus::*;
        match (self, next) {
            (Pending, Pending) => false,
            (Pending, _) => true,
            (Sent, Delivered | Replied | Failed) => true,
            (Delivered, Replied) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Delivered => "delivered",
            RecipientStatus::Replied => "replied",
            RecipientStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_status_only_moves_forward() {
        use RecipientStatus::*;
        assert!(Pending.can_advance_to(Sent));
        assert!(Pending.can_advance_to(Failed));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Delivered.can_advance_to(Replied));
        assert!(!Delivered.can_advance_to(Sent));
        assert!(!Replied.can_advance_to(Delivered));
        assert!(!Failed.can_advance_to(Sent));
        assert!(!Pending.can_advance_to(Pending));
    }

    #[test]
    fn cap_counts_only_attempted_sends() {
        assert!(RecipientStatus::Sent.counts_toward_cap());
        assert!(RecipientStatus::Delivered.counts_toward_cap());
        assert!(RecipientStatus::Replied.counts_toward_cap());
        assert!(!RecipientStatus::Pending.counts_toward_cap());
        assert!(!RecipientStatus::Failed.counts_toward_cap());
    }

    #[test]
    fn workspace_without_number_cannot_send() {
        let mut ws = Workspace {
            id: Uuid::new_v4(),
            name: "Downtown".into(),
            outbound_number: Some("  ".into()),
            created_at: Utc::now(),
        };
        assert!(!ws.can_send());
        ws.outbound_number = Some("+15550100".into());
        assert!(ws.can_send());
    }

    #[test]
    fn counters_add() {
        let mut total = CampaignCounters::default();
        total += CampaignCounters {
            total_recipients: 10,
            sent_count: 6,
            delivered_count: 4,
            replied_count: 1,
        };
        total += CampaignCounters {
            total_recipients: 2,
            sent_count: 2,
            delivered_count: 2,
            replied_count: 0,
        };
        assert_eq!(total.total_recipients, 12);
        assert_eq!(total.delivered_count, 6);
    }
}
