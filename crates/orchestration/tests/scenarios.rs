//! End-to-end orchestration scenarios: audience preview and launch,
//! cross-campaign frequency capping, group status derivation and
//! cancellation of an in-flight campaign.
//! Runs fully in memory against a capturing dispatch queue.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use campaign_core::audience::{AudienceRequest, AudienceType};
    use campaign_core::auth::AuthContext;
    use campaign_core::config::EngineConfig;
    use campaign_core::dispatch::{capture_dispatch, CaptureDispatch, RecipientStatusUpdate};
    use campaign_core::types::{CampaignStatus, Contact, RecipientStatus, Workspace};
    use campaign_orchestration::{
        CampaignEngine, CreateCampaignRequest, CreateGroupRequest, GroupCoordinator,
        PreviewAudienceRequest, RecipientQuery, CANCELLED_MESSAGE,
    };
    use campaign_store::CampaignStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct Harness {
        store: Arc<CampaignStore>,
        queue: Arc<CaptureDispatch>,
        engine: Arc<CampaignEngine>,
        groups: GroupCoordinator,
        auth: AuthContext,
    }

    fn harness(workspaces: &[(Uuid, bool)]) -> Harness {
        let store = Arc::new(CampaignStore::new());
        let user = Uuid::new_v4();
        for (id, can_send) in workspaces {
            store.upsert_workspace(Workspace {
                id: *id,
                name: format!("Location {id}"),
                outbound_number: can_send.then(|| "+15550142".to_string()),
                created_at: Utc::now(),
            });
            store.add_membership(user, *id);
        }
        let queue = capture_dispatch();
        let engine = Arc::new(CampaignEngine::new(
            store.clone(),
            queue.clone(),
            EngineConfig::default(),
        ));
        let auth = AuthContext::new(user, store.memberships(&user));
        Harness {
            groups: GroupCoordinator::new(engine.clone()),
            store,
            queue,
            engine,
            auth,
        }
    }

    fn contact(workspace_id: Uuid, i: usize, phone: bool, opted_out: bool) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            workspace_id,
            name: format!("Guest {i}"),
            phone: phone.then(|| format!("+1555200{i:04}")),
            email: None,
            is_contact: true,
            opted_out,
            stage: Some(if i % 3 == 0 { "vip" } else { "regular" }.into()),
            category_ids: HashSet::new(),
            last_contacted_at: None,
            created_at: Utc::now() - Duration::days(60) + Duration::minutes(i as i64),
        }
    }

    fn seed(h: &Harness, ws: Uuid, eligible: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..eligible {
            let c = contact(ws, i, true, false);
            ids.push(c.id);
            h.store.upsert_contact(c);
        }
        h.store.upsert_contact(contact(ws, 900, true, true));
        h.store.upsert_contact(contact(ws, 901, false, false));
        ids
    }

    fn request(name: &str, audience_type: AudienceType, cap: Option<u32>) -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: name.into(),
            message_template: "Hello from the team".into(),
            audience: AudienceRequest {
                audience_type: Some(audience_type),
                ..AudienceRequest::default()
            },
            frequency_cap_days: cap,
            scheduled_at: None,
        }
    }

    fn report(
        campaign_id: Uuid,
        contact_id: Uuid,
        status: RecipientStatus,
        ago: Duration,
    ) -> RecipientStatusUpdate {
        RecipientStatusUpdate {
            campaign_id,
            contact_id,
            status,
            occurred_at: Utc::now() - ago,
            error_message: None,
        }
    }

    #[test]
    fn preview_then_launch_all_audience() {
        let ws = Uuid::new_v4();
        let h = harness(&[(ws, true)]);
        let contacts = seed(&h, ws, 10);

        let preview = h
            .engine
            .preview_audience(&h.auth, ws, PreviewAudienceRequest::default())
            .unwrap();
        assert_eq!(preview.count, 10);
        assert_eq!(preview.sample.len(), 5);

        let c = h
            .engine
            .create_campaign(&h.auth, ws, request("Welcome back", AudienceType::All, None))
            .unwrap();
        let launched = h.engine.launch_campaign(&h.auth, &c.id).unwrap();
        assert_eq!(launched.status, CampaignStatus::Sending);
        assert_eq!(launched.counters.total_recipients, 10);

        let page = h
            .engine
            .get_recipients(
                &h.auth,
                &c.id,
                RecipientQuery {
                    status: Some(RecipientStatus::Pending),
                    page: Some(1),
                    page_size: Some(50),
                },
            )
            .unwrap();
        assert_eq!(page.total, 10);
        let listed: HashSet<Uuid> = page.recipients.iter().map(|r| r.recipient.contact_id).collect();
        assert_eq!(listed, contacts.into_iter().collect());
        assert_eq!(h.queue.count_for(c.id), 1);
    }

    #[test]
    fn resolver_never_targets_unreachable_contacts() {
        let ws = Uuid::new_v4();
        let h = harness(&[(ws, true)]);
        seed(&h, ws, 6);

        for kind in [AudienceType::All, AudienceType::Stage, AudienceType::Inactive] {
            let c = h
                .engine
                .create_campaign(&h.auth, ws, request("Sweep", kind, None))
                .unwrap();
            h.engine.launch_campaign(&h.auth, &c.id).unwrap();
            h.store.read_ledger(&c.id, |l| {
                for row in l.rows() {
                    let contact = h.store.get_contact(&ws, &row.contact_id).unwrap();
                    assert!(!contact.opted_out);
                    assert!(contact.has_phone());
                }
            });
        }
    }

    #[test]
    fn frequency_cap_spans_campaigns() {
        let ws = Uuid::new_v4();
        let h = harness(&[(ws, true)]);
        let contacts = seed(&h, ws, 3);
        let (x, y) = (contacts[0], contacts[1]);

        let earlier = h
            .engine
            .create_campaign(&h.auth, ws, request("Earlier", AudienceType::All, None))
            .unwrap();
        h.engine.launch_campaign(&h.auth, &earlier.id).unwrap();
        h.engine
            .apply_status_update(report(earlier.id, x, RecipientStatus::Delivered, Duration::days(3)))
            .unwrap();
        h.engine
            .apply_status_update(report(earlier.id, y, RecipientStatus::Failed, Duration::days(1)))
            .unwrap();

        let capped = h
            .engine
            .create_campaign(&h.auth, ws, request("Capped", AudienceType::All, Some(7)))
            .unwrap();
        h.engine.launch_campaign(&h.auth, &capped.id).unwrap();
        h.store.read_ledger(&capped.id, |l| {
            assert!(!l.contains(&x));
            assert!(l.contains(&y));
            assert_eq!(l.len(), 2);
        });
    }

    #[test]
    fn relaunch_never_duplicates_rows() {
        let ws = Uuid::new_v4();
        let h = harness(&[(ws, true)]);
        seed(&h, ws, 4);
        let c = h
            .engine
            .create_campaign(&h.auth, ws, request("Once", AudienceType::All, None))
            .unwrap();
        h.engine.launch_campaign(&h.auth, &c.id).unwrap();
        assert!(h.engine.launch_campaign(&h.auth, &c.id).is_err());
        h.engine.pause_campaign(&h.auth, &c.id).unwrap();
        h.engine.resume_campaign(&h.auth, &c.id).unwrap();
        assert_eq!(h.store.read_ledger(&c.id, |l| l.len()), 4);
    }

    #[test]
    fn group_status_follows_children() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let h = harness(&[(a, true), (b, true), (c, true)]);
        let contacts_a = seed(&h, a, 1);

        let group = h
            .groups
            .create_group(
                &h.auth,
                CreateGroupRequest {
                    name: "Grand opening".into(),
                    workspace_ids: vec![a, b, c],
                    message_template: "Join us this weekend".into(),
                    audience: AudienceRequest::default(),
                    frequency_cap_days: None,
                    scheduled_at: None,
                },
            )
            .unwrap();

        // b and c have nobody to message and complete at launch.
        let launched = h.groups.launch_group(&h.auth, &group.id).unwrap();
        let mut statuses: Vec<CampaignStatus> =
            launched.group.campaigns.iter().map(|c| c.status).collect();
        statuses.sort_by_key(|s| s.as_str());
        assert_eq!(
            statuses,
            vec![CampaignStatus::Completed, CampaignStatus::Completed, CampaignStatus::Sending]
        );
        assert_eq!(launched.group.status, CampaignStatus::Sending);

        let child_a = launched
            .group
            .campaigns
            .iter()
            .find(|c| c.workspace_id == a)
            .unwrap()
            .id;
        h.engine
            .apply_status_update(report(child_a, contacts_a[0], RecipientStatus::Sent, Duration::zero()))
            .unwrap();

        let view = h.groups.get_group(&h.auth, &group.id).unwrap();
        assert_eq!(view.status, CampaignStatus::Completed);
        assert_eq!(view.totals.sent_count, 1);
    }

    #[test]
    fn group_creation_is_atomic() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let h = harness(&[(a, true), (b, true), (c, false)]);
        let result = h.groups.create_group(
            &h.auth,
            CreateGroupRequest {
                name: "Grand opening".into(),
                workspace_ids: vec![a, b, c],
                message_template: "Join us".into(),
                audience: AudienceRequest::default(),
                frequency_cap_days: None,
                scheduled_at: None,
            },
        );
        assert!(result.is_err());
        for ws in [a, b, c] {
            assert!(h.store.campaigns_in_workspace(&ws).is_empty());
        }
        assert!(h.groups.list_groups(&h.auth).is_empty());
    }

    #[test]
    fn cancel_in_flight_campaign() {
        let ws = Uuid::new_v4();
        let h = harness(&[(ws, true)]);
        let contacts = seed(&h, ws, 10);
        let c = h
            .engine
            .create_campaign(&h.auth, ws, request("Flash sale", AudienceType::All, None))
            .unwrap();
        h.engine.launch_campaign(&h.auth, &c.id).unwrap();
        for id in &contacts[..6] {
            h.engine
                .apply_status_update(report(c.id, *id, RecipientStatus::Sent, Duration::zero()))
                .unwrap();
        }

        let cancelled = h.engine.cancel_campaign(&h.auth, &c.id).unwrap();
        assert_eq!(cancelled.status, CampaignStatus::Cancelled);
        assert_eq!(cancelled.counters.sent_count, 6);

        h.store.read_ledger(&c.id, |l| {
            assert_eq!(l.pending_count(), 0);
            assert_eq!(l.count_status(RecipientStatus::Sent), 6);
            for id in &contacts[6..] {
                let row = l.get(id).unwrap();
                assert_eq!(row.status, RecipientStatus::Failed);
                assert_eq!(row.error_message.as_deref(), Some(CANCELLED_MESSAGE));
            }
        });

        // Late worker reports for cancelled rows are ignored.
        let late = h
            .engine
            .apply_status_update(report(c.id, contacts[9], RecipientStatus::Sent, Duration::zero()))
            .unwrap();
        assert!(!late.applied);
        assert_eq!(late.campaign_status, CampaignStatus::Cancelled);
    }
}
