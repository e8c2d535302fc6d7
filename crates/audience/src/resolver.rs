//! Audience resolver: turns an audience spec into the eligible contact set.
//!
//! The same predicate drives both the bounded preview (count plus a small
//! random sample) and the full resolution performed at launch.

use campaign_core::audience::AudienceSpec;
use campaign_core::types::{Contact, ContactSummary};
use campaign_store::CampaignStore;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::frequency_cap::FrequencyCapFilter;
use crate::predicates::AudiencePredicate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudiencePreview {
    pub count: u64,
    pub sample: Vec<ContactSummary>,
}

/// Fully resolved audience, ordered by contact creation time.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAudience {
    pub contact_ids: Vec<Uuid>,
    /// Eligible contacts dropped by the frequency cap.
    pub capped: u64,
}

impl ResolvedAudience {
    pub fn len(&self) -> usize {
        self.contact_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contact_ids.is_empty()
    }
}

pub struct AudienceResolver {
    preview_sample_size: usize,
}

impl AudienceResolver {
    pub fn new(preview_sample_size: usize) -> Self {
        Self {
            preview_sample_size,
        }
    }

    /// The eligibility predicate for `spec` in `workspace_id`.
    pub fn predicate(
        &self,
        workspace_id: Uuid,
        spec: &AudienceSpec,
        now: DateTime<Utc>,
    ) -> AudiencePredicate {
        AudiencePredicate::for_spec(workspace_id, spec, now)
    }

    /// Materialize the audience, minus frequency-capped contacts.
    pub fn resolve(
        &self,
        store: &CampaignStore,
        workspace_id: Uuid,
        spec: &AudienceSpec,
        frequency_cap_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> ResolvedAudience {
        let predicate = self.predicate(workspace_id, spec, now);
        let exclusions = FrequencyCapFilter::exclusions(store, &workspace_id, frequency_cap_days, now);

        let mut eligible: Vec<(DateTime<Utc>, Uuid)> = Vec::new();
        let mut capped = 0u64;
        store.scan_contacts(&workspace_id, |c| {
            if !predicate.matches(c) {
                return;
            }
            if exclusions.is_excluded(&c.id) {
                capped += 1;
            } else {
                eligible.push((c.created_at, c.id));
            }
        });
        eligible.sort_unstable();

        debug!(
            workspace_id = %workspace_id,
            audience = ?spec.kind(),
            eligible = eligible.len(),
            capped,
            "Audience resolved"
        );
        metrics::counter!("audience.resolved").increment(1);

        ResolvedAudience {
            contact_ids: eligible.into_iter().map(|(_, id)| id).collect(),
            capped,
        }
    }

    /// Count the audience and keep a uniform random sample of at most
    /// `preview_sample_size` contacts, without materializing the full list.
    pub fn preview(
        &self,
        store: &CampaignStore,
        workspace_id: Uuid,
        spec: &AudienceSpec,
        frequency_cap_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> AudiencePreview {
        let predicate = self.predicate(workspace_id, spec, now);
        let exclusions = FrequencyCapFilter::exclusions(store, &workspace_id, frequency_cap_days, now);

        let mut rng = rand::thread_rng();
        let mut reservoir: Vec<ContactSummary> = Vec::with_capacity(self.preview_sample_size);
        let mut count = 0u64;
        store.scan_contacts(&workspace_id, |c: &Contact| {
            if !predicate.matches(c) || exclusions.is_excluded(&c.id) {
                return;
            }
            count += 1;
            if reservoir.len() < self.preview_sample_size {
                reservoir.push(ContactSummary::from(c));
            } else if self.preview_sample_size > 0 {
                let slot = rng.gen_range(0..count) as usize;
                if slot < self.preview_sample_size {
                    reservoir[slot] = ContactSummary::from(c);
                }
            }
        });

        metrics::counter!("audience.previewed").increment(1);
        AudiencePreview {
            count,
            sample: reservoir,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn seed(store: &CampaignStore, ws: Uuid, eligible: usize) -> Vec<Uuid> {
        let now = Utc::now();
        let mut ids = Vec::new();
        for i in 0..eligible {
            let id = Uuid::new_v4();
            ids.push(id);
            store.upsert_contact(Contact {
                id,
                workspace_id: ws,
                name: format!("Contact {i}"),
                phone: Some(format!("+1555000{i:04}")),
                email: None,
                is_contact: true,
                opted_out: false,
                stage: Some(if i % 2 == 0 { "lead" } else { "customer" }.into()),
                category_ids: HashSet::new(),
                last_contacted_at: None,
                created_at: now - chrono::Duration::seconds(i as i64),
            });
        }
        // Two ineligible contacts in the same workspace.
        store.upsert_contact(Contact {
            id: Uuid::new_v4(),
            workspace_id: ws,
            name: "Opted out".into(),
            phone: Some("+15559999".into()),
            email: None,
            is_contact: true,
            opted_out: true,
            stage: Some("lead".into()),
            category_ids: HashSet::new(),
            last_contacted_at: None,
            created_at: now,
        });
        store.upsert_contact(Contact {
            id: Uuid::new_v4(),
            workspace_id: ws,
            name: "No phone".into(),
            phone: None,
            email: Some("x@example.com".into()),
            is_contact: true,
            opted_out: false,
            stage: Some("lead".into()),
            category_ids: HashSet::new(),
            last_contacted_at: None,
            created_at: now,
        });
        ids
    }

    #[test]
    fn preview_counts_and_bounds_sample() {
        let store = CampaignStore::new();
        let ws = Uuid::new_v4();
        let ids = seed(&store, ws, 10);
        let resolver = AudienceResolver::new(5);

        let preview = resolver.preview(&store, ws, &AudienceSpec::All, None, Utc::now());
        assert_eq!(preview.count, 10);
        assert_eq!(preview.sample.len(), 5);
        let sampled: HashSet<Uuid> = preview.sample.iter().map(|s| s.id).collect();
        assert_eq!(sampled.len(), 5);
        assert!(sampled.iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn preview_of_small_audience_returns_everyone() {
        let store = CampaignStore::new();
        let ws = Uuid::new_v4();
        seed(&store, ws, 3);
        let preview = AudienceResolver::new(5).preview(&store, ws, &AudienceSpec::All, None, Utc::now());
        assert_eq!(preview.count, 3);
        assert_eq!(preview.sample.len(), 3);
    }

    #[test]
    fn resolve_orders_by_creation_and_filters_stage() {
        let store = CampaignStore::new();
        let ws = Uuid::new_v4();
        let ids = seed(&store, ws, 6);
        let resolver = AudienceResolver::new(5);

        let leads = resolver.resolve(
            &store,
            ws,
            &AudienceSpec::Stage { stage: "lead".into() },
            None,
            Utc::now(),
        );
        // Even indices are leads; higher index means created earlier.
        assert_eq!(leads.contact_ids, vec![ids[4], ids[2], ids[0]]);
        assert_eq!(leads.capped, 0);
    }

    #[test]
    fn unknown_workspace_resolves_empty() {
        let store = CampaignStore::new();
        let resolved = AudienceResolver::new(5).resolve(
            &store,
            Uuid::new_v4(),
            &AudienceSpec::All,
            Some(7),
            Utc::now(),
        );
        assert!(resolved.is_empty());
    }
}
