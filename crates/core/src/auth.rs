//! Caller identity passed explicitly into every engine operation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

/// The authenticated caller and the workspaces they are a member of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub workspace_ids: HashSet<Uuid>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, workspace_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            user_id,
            workspace_ids: workspace_ids.into_iter().collect(),
        }
    }

    pub fn is_member(&self, workspace_id: &Uuid) -> bool {
        self.workspace_ids.contains(workspace_id)
    }

    pub fn require_member(&self, workspace_id: &Uuid) -> CampaignResult<()> {
        if self.is_member(workspace_id) {
            Ok(())
        } else {
            Err(CampaignError::forbidden(format!(
                "No access to workspace {workspace_id}"
            )))
        }
    }
}
