//! Per-campaign recipient table with a unique (campaign, contact) index.

use std::collections::HashMap;

use campaign_core::types::{CampaignCounters, CampaignRecipient, RecipientStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Rows are kept in insertion order so paging is stable.
#[derive(Debug, Default, Clone)]
pub struct LedgerTable {
    rows: Vec<CampaignRecipient>,
    by_contact: HashMap<Uuid, usize>,
}

/// Outcome of applying a worker status report to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowUpdate {
    Applied {
        from: RecipientStatus,
        to: RecipientStatus,
    },
    /// The row already sits at or beyond the reported status.
    Stale { current: RecipientStatus },
    UnknownContact,
}

impl LedgerTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, contact_id: &Uuid) -> bool {
        self.by_contact.contains_key(contact_id)
    }

    pub fn get(&self, contact_id: &Uuid) -> Option<&CampaignRecipient> {
        self.by_contact.get(contact_id).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[CampaignRecipient] {
        &self.rows
    }

    /// Insert a pending row for every contact not already recorded.
    /// Returns the number of rows created.
    pub fn insert_pending<I>(&mut self, campaign_id: Uuid, contact_ids: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut created = 0;
        for contact_id in contact_ids {
            if self.by_contact.contains_key(&contact_id) {
                continue;
            }
            self.by_contact.insert(contact_id, self.rows.len());
            self.rows
                .push(CampaignRecipient::pending(campaign_id, contact_id, now));
            created += 1;
        }
        created
    }

    /// Move a row forward. Out-of-order reports that would move a row
    /// backwards are reported as stale and leave the row untouched.
    pub fn apply_status(
        &mut self,
        contact_id: &Uuid,
        status: RecipientStatus,
        at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> RowUpdate {
        let Some(&idx) = self.by_contact.get(contact_id) else {
            return RowUpdate::UnknownContact;
        };
        let row = &mut self.rows[idx];
        let from = row.status;
        if !from.can_advance_to(status) {
            return RowUpdate::Stale { current: from };
        }

        row.status = status;
        match status {
            RecipientStatus::Sent => {
                row.sent_at.get_or_insert(at);
            }
            RecipientStatus::Delivered => {
                row.sent_at.get_or_insert(at);
                row.delivered_at.get_or_insert(at);
            }
            RecipientStatus::Replied => {
                row.sent_at.get_or_insert(at);
                row.delivered_at.get_or_insert(at);
                row.replied_at.get_or_insert(at);
            }
            RecipientStatus::Failed => {
                row.failed_at = Some(at);
                row.error_message = error_message;
            }
            RecipientStatus::Pending => {}
        }
        RowUpdate::Applied { from, to: status }
    }

    /// Fail every pending row with the given message. Returns how many
    /// rows changed.
    pub fn fail_pending(&mut self, message: &str, at: DateTime<Utc>) -> usize {
        let mut failed = 0;
        for row in self
            .rows
            .iter_mut()
            .filter(|r| r.status == RecipientStatus::Pending)
        {
            row.status = RecipientStatus::Failed;
            row.error_message = Some(message.to_string());
            row.failed_at = Some(at);
            failed += 1;
        }
        failed
    }

    pub fn count_status(&self, status: RecipientStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    pub fn pending_count(&self) -> usize {
        self.count_status(RecipientStatus::Pending)
    }

    /// Counters derived from row timestamps. A timestamp is never cleared,
    /// so the counts never decrease during a run.
    pub fn counters(&self) -> CampaignCounters {
        let mut c = CampaignCounters {
            total_recipients: self.rows.len() as u64,
            ..CampaignCounters::default()
        };
        for row in &self.rows {
            if row.sent_at.is_some() {
                c.sent_count += 1;
            }
            if row.delivered_at.is_some() {
                c.delivered_count += 1;
            }
            if row.replied_at.is_some() {
                c.replied_count += 1;
            }
        }
        c
    }

    /// Rows matching `status` (all when `None`), skipping `offset` and
    /// returning at most `limit`, plus the total number of matches.
    pub fn page(
        &self,
        status: Option<RecipientStatus>,
        offset: usize,
        limit: usize,
    ) -> (Vec<CampaignRecipient>, usize) {
        let matches = |r: &&CampaignRecipient| status.map_or(true, |s| r.status == s);
        let total = self.rows.iter().filter(matches).count();
        let rows = self
            .rows
            .iter()
            .filter(matches)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (rows, total)
    }

    /// Contacts with a cap-counting row sent at or after `cutoff`.
    pub fn recently_messaged(&self, cutoff: DateTime<Utc>) -> impl Iterator<Item = Uuid> + '_ {
        self.rows
            .iter()
            .filter(move |r| {
                r.status.counts_toward_cap() && r.send_timestamp().is_some_and(|t| t >= cutoff)
            })
            .map(|r| r.contact_id)
    }
}
