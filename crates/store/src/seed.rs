//! Demo directory data for local development.

use std::collections::HashSet;

use campaign_core::types::{Contact, Workspace};
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::store::CampaignStore;

/// Fixed id of the demo user so local requests can send `x-user-id`.
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);

impl CampaignStore {
    /// Seed three locations (one without an outbound number) with a mix of
    /// eligible and ineligible contacts.
    pub fn seed_demo_data(&self) {
        let now = Utc::now();
        let locations = [
            ("Downtown", Some("+15550100")),
            ("Harbor", Some("+15550200")),
            ("Airport Kiosk", None),
        ];
        let stages = ["lead", "customer", "vip"];
        let loyal = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_00ca);

        for (name, number) in locations {
            let workspace = Workspace {
                id: Uuid::new_v4(),
                name: name.to_string(),
                outbound_number: number.map(str::to_string),
                created_at: now - Duration::days(90),
            };
            let ws = workspace.id;
            self.upsert_workspace(workspace);
            self.add_membership(DEMO_USER_ID, ws);

            for i in 0..24u32 {
                let mut category_ids = HashSet::new();
                if i % 4 == 0 {
                    category_ids.insert(loyal);
                }
                self.upsert_contact(Contact {
                    id: Uuid::new_v4(),
                    workspace_id: ws,
                    name: format!("{name} Contact {i:02}"),
                    phone: (i % 7 != 0).then(|| format!("+1555{:07}", i)),
                    email: Some(format!("contact{i}@example.com")),
                    is_contact: i % 11 != 0,
                    opted_out: i % 9 == 0,
                    stage: Some(stages[(i as usize) % stages.len()].to_string()),
                    category_ids,
                    last_contacted_at: (i % 3 == 0).then(|| now - Duration::days(i64::from(i) * 5)),
                    created_at: now - Duration::days(60),
                });
            }
        }

        info!(user_id = %DEMO_USER_ID, "Seeded demo workspaces and contacts");
    }
}
