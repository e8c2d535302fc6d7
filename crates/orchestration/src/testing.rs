//! Shared fixture for the engine unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use campaign_core::audience::AudienceRequest;
use campaign_core::auth::AuthContext;
use campaign_core::config::EngineConfig;
use campaign_core::dispatch::{capture_dispatch, CaptureDispatch};
use campaign_core::types::{Contact, Workspace};
use campaign_store::CampaignStore;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::engine::CampaignEngine;
use crate::models::CreateCampaignRequest;

const POOL: usize = 8;

pub(crate) struct Fixture {
    pub store: Arc<CampaignStore>,
    pub queue: Arc<CaptureDispatch>,
    pub engine: Arc<CampaignEngine>,
    pub auth: AuthContext,
    pool: Vec<Uuid>,
    next: AtomicUsize,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(CampaignStore::new());
        let queue = capture_dispatch();
        let engine = Arc::new(CampaignEngine::new(store.clone(), queue.clone(), config));
        let pool: Vec<Uuid> = (0..POOL).map(|_| Uuid::new_v4()).collect();
        let auth = AuthContext::new(Uuid::new_v4(), pool.iter().copied());
        Self {
            store,
            queue,
            engine,
            auth,
            pool,
            next: AtomicUsize::new(0),
        }
    }

    /// A workspace the fixture caller is a member of.
    pub fn workspace(&self, name: &str, can_send: bool) -> Uuid {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        let id = self.pool[idx];
        self.put_workspace(id, name, can_send);
        id
    }

    /// A workspace the fixture caller does not belong to.
    pub fn foreign_workspace(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.put_workspace(id, name, true);
        id
    }

    fn put_workspace(&self, id: Uuid, name: &str, can_send: bool) {
        self.store.upsert_workspace(Workspace {
            id,
            name: name.into(),
            outbound_number: can_send.then(|| "+15550100".to_string()),
            created_at: Utc::now(),
        });
    }

    /// `n` reachable contacts, oldest first.
    pub fn contacts(&self, workspace_id: Uuid, n: usize) -> Vec<Uuid> {
        let base = Utc::now() - Duration::days(30);
        (0..n)
            .map(|i| {
                let id = Uuid::new_v4();
                self.store.upsert_contact(Contact {
                    id,
                    workspace_id,
                    name: format!("Contact {i}"),
                    phone: Some(format!("+1555300{i:04}")),
                    email: None,
                    is_contact: true,
                    opted_out: false,
                    stage: Some("customer".into()),
                    category_ids: HashSet::new(),
                    last_contacted_at: None,
                    created_at: base + Duration::minutes(i as i64),
                });
                id
            })
            .collect()
    }

    pub fn opt_out(&self, workspace_id: Uuid, contact_id: Uuid) {
        if let Some(mut contact) = self.store.get_contact(&workspace_id, &contact_id) {
            contact.opted_out = true;
            self.store.upsert_contact(contact);
        }
    }

    pub fn campaign_request(name: &str) -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: name.into(),
            message_template: "Hi {{first_name}}, thanks for being a customer".into(),
            audience: AudienceRequest::default(),
            frequency_cap_days: None,
            scheduled_at: None,
        }
    }
}
