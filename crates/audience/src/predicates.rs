//! Audience predicates: the eligibility test a contact must pass.

use campaign_core::audience::AudienceSpec;
use campaign_core::types::Contact;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A resolved eligibility predicate for one workspace.
///
/// The base filters (workspace, `is_contact`, not opted out, phone present)
/// are not optional: there is no way to build a predicate without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudiencePredicate {
    workspace_id: Uuid,
    restriction: Restriction,
}

/// Extra restriction layered on top of the base filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Restriction {
    None,
    StageEquals { stage: String },
    InCategory { category_id: Uuid },
    /// Never contacted, or last contacted strictly before `before`.
    LastContactedBefore { before: DateTime<Utc> },
}

impl AudiencePredicate {
    /// Build the predicate for `spec`, evaluating relative windows at `now`.
    pub fn for_spec(workspace_id: Uuid, spec: &AudienceSpec, now: DateTime<Utc>) -> Self {
        let restriction = match spec {
            AudienceSpec::All => Restriction::None,
            AudienceSpec::Stage { stage } => Restriction::StageEquals {
                stage: stage.clone(),
            },
            AudienceSpec::Category { category_id } => Restriction::InCategory {
                category_id: *category_id,
            },
            AudienceSpec::Inactive { inactive_days } => Restriction::LastContactedBefore {
                before: days_before(now, *inactive_days),
            },
        };
        Self {
            workspace_id,
            restriction,
        }
    }

    pub fn workspace_id(&self) -> Uuid {
        self.workspace_id
    }

    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        passes_base_filters(self.workspace_id, contact) && self.restriction.matches(contact)
    }
}

impl Restriction {
    fn matches(&self, contact: &Contact) -> bool {
        match self {
            Restriction::None => true,
            Restriction::StageEquals { stage } => contact.stage.as_deref() == Some(stage.as_str()),
            Restriction::InCategory { category_id } => contact.category_ids.contains(category_id),
            Restriction::LastContactedBefore { before } => contact
                .last_contacted_at
                .map_or(true, |last| last < *before),
        }
    }
}

/// `now` minus `days`, clamped to the earliest representable instant.
pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Filters every audience applies regardless of type.
pub fn passes_base_filters(workspace_id: Uuid, contact: &Contact) -> bool {
    contact.workspace_id == workspace_id
        && contact.is_contact
        && !contact.opted_out
        && contact.has_phone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn contact(ws: Uuid) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            workspace_id: ws,
            name: "Grace".into(),
            phone: Some("+15550123".into()),
            email: None,
            is_contact: true,
            opted_out: false,
            stage: Some("lead".into()),
            category_ids: HashSet::new(),
            last_contacted_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn base_filters_apply_to_every_type() {
        let ws = Uuid::new_v4();
        let now = Utc::now();
        let cat = Uuid::new_v4();
        let specs = [
            AudienceSpec::All,
            AudienceSpec::Stage { stage: "lead".into() },
            AudienceSpec::Category { category_id: cat },
            AudienceSpec::Inactive { inactive_days: 30 },
        ];

        let mut opted_out = contact(ws);
        opted_out.opted_out = true;
        opted_out.category_ids.insert(cat);
        let mut phoneless = contact(ws);
        phoneless.phone = Some(" ".into());
        phoneless.category_ids.insert(cat);
        let mut lead_only = contact(ws);
        lead_only.is_contact = false;
        lead_only.category_ids.insert(cat);
        let mut foreign = contact(Uuid::new_v4());
        foreign.category_ids.insert(cat);

        for spec in &specs {
            let p = AudiencePredicate::for_spec(ws, spec, now);
            assert!(!p.matches(&opted_out), "{spec:?} let an opted-out contact through");
            assert!(!p.matches(&phoneless), "{spec:?} let a phoneless contact through");
            assert!(!p.matches(&lead_only));
            assert!(!p.matches(&foreign));
        }
    }

    #[test]
    fn stage_and_category_restrict() {
        let ws = Uuid::new_v4();
        let now = Utc::now();
        let cat = Uuid::new_v4();
        let mut c = contact(ws);

        let stage = AudiencePredicate::for_spec(ws, &AudienceSpec::Stage { stage: "vip".into() }, now);
        assert!(!stage.matches(&c));
        c.stage = Some("vip".into());
        assert!(stage.matches(&c));

        let category = AudiencePredicate::for_spec(ws, &AudienceSpec::Category { category_id: cat }, now);
        assert!(!category.matches(&c));
        c.category_ids.insert(cat);
        assert!(category.matches(&c));
    }

    #[test]
    fn inactive_includes_never_contacted() {
        let ws = Uuid::new_v4();
        let now = Utc::now();
        let p = AudiencePredicate::for_spec(ws, &AudienceSpec::Inactive { inactive_days: 14 }, now);

        let mut c = contact(ws);
        assert!(p.matches(&c));
        c.last_contacted_at = Some(now - Duration::days(20));
        assert!(p.matches(&c));
        c.last_contacted_at = Some(now - Duration::days(3));
        assert!(!p.matches(&c));
    }

    #[test]
    fn oversized_inactive_window_clamps_instead_of_overflowing() {
        let ws = Uuid::new_v4();
        let now = Utc::now();
        let p = AudiencePredicate::for_spec(
            ws,
            &AudienceSpec::Inactive {
                inactive_days: 1_000_000_000,
            },
            now,
        );
        assert_eq!(
            p.restriction(),
            &Restriction::LastContactedBefore {
                before: DateTime::<Utc>::MIN_UTC
            }
        );

        let mut c = contact(ws);
        assert!(p.matches(&c));
        c.last_contacted_at = Some(now - Duration::days(40_000));
        assert!(!p.matches(&c));
    }
}
