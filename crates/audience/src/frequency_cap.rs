//! Frequency capping: keeps recently messaged contacts out of new sends.
//!
//! A contact is capped when any campaign in the same workspace has a
//! sent, delivered or replied row for them inside the window. Pending and
//! failed rows never count.

use std::collections::HashSet;

use campaign_store::CampaignStore;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::predicates::days_before;

/// Exclusion set produced by the cap, ready for set-difference.
#[derive(Debug, Clone, Default)]
pub struct CapExclusions {
    contacts: HashSet<Uuid>,
}

impl CapExclusions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_excluded(&self, contact_id: &Uuid) -> bool {
        self.contacts.contains(contact_id)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

pub struct FrequencyCapFilter;

impl FrequencyCapFilter {
    pub fn cutoff(now: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
        days_before(now, window_days)
    }

    /// Contacts to exclude for a cap of `window_days`. No window (or a zero
    /// window) excludes nobody.
    pub fn exclusions(
        store: &CampaignStore,
        workspace_id: &Uuid,
        window_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> CapExclusions {
        match window_days.filter(|d| *d > 0) {
            Some(days) => CapExclusions {
                contacts: store.recently_messaged(workspace_id, Self::cutoff(now, days)),
            },
            None => CapExclusions::none(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_core::audience::AudienceSpec;
    use campaign_core::types::{Campaign, CampaignCounters, CampaignStatus, RecipientStatus};
    use chrono::Duration;

    fn seed_campaign(store: &CampaignStore, ws: Uuid) -> Uuid {
        let now = Utc::now();
        let c = Campaign {
            id: Uuid::new_v4(),
            workspace_id: ws,
            group_id: None,
            name: "Earlier blast".into(),
            message_template: "Hello".into(),
            audience: AudienceSpec::All,
            frequency_cap_days: None,
            scheduled_at: None,
            status: CampaignStatus::Completed,
            counters: CampaignCounters::default(),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        let id = c.id;
        store.insert_campaign(c);
        id
    }

    #[test]
    fn no_window_excludes_nobody() {
        let store = CampaignStore::new();
        let ex = FrequencyCapFilter::exclusions(&store, &Uuid::new_v4(), None, Utc::now());
        assert!(ex.is_empty());
        let ex = FrequencyCapFilter::exclusions(&store, &Uuid::new_v4(), Some(0), Utc::now());
        assert!(ex.is_empty());
    }

    #[test]
    fn failed_and_pending_rows_do_not_count() {
        let store = CampaignStore::new();
        let ws = Uuid::new_v4();
        let cid = seed_campaign(&store, ws);
        let now = Utc::now();
        let (delivered, failed, pending, old) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.with_ledger(&cid, |l| {
            l.insert_pending(cid, [delivered, failed, pending, old], now);
            l.apply_status(&delivered, RecipientStatus::Delivered, now - Duration::days(3), None);
            l.apply_status(&failed, RecipientStatus::Failed, now - Duration::days(1), None);
            l.apply_status(&old, RecipientStatus::Replied, now - Duration::days(8), None);
        });

        let ex = FrequencyCapFilter::exclusions(&store, &ws, Some(7), now);
        assert!(ex.is_excluded(&delivered));
        assert!(!ex.is_excluded(&failed));
        assert!(!ex.is_excluded(&pending));
        assert!(!ex.is_excluded(&old));
        assert_eq!(ex.len(), 1);
    }

    #[test]
    fn huge_window_reaches_back_to_the_first_send() {
        let store = CampaignStore::new();
        let ws = Uuid::new_v4();
        let cid = seed_campaign(&store, ws);
        let now = Utc::now();
        let ancient = Uuid::new_v4();
        store.with_ledger(&cid, |l| {
            l.insert_pending(cid, [ancient], now);
            l.apply_status(&ancient, RecipientStatus::Sent, now - Duration::days(9_000), None);
        });

        assert_eq!(FrequencyCapFilter::cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
        let ex = FrequencyCapFilter::exclusions(&store, &ws, Some(u32::MAX), now);
        assert!(ex.is_excluded(&ancient));
    }
}
