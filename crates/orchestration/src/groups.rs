//! Campaign group coordinator: one logical campaign fanned out across
//! several workspaces.
//!
//! A group stores only its name and author. Status and totals are computed
//! from the child campaigns on every read and are scoped to the workspaces
//! the caller belongs to.

use std::collections::HashSet;
use std::sync::Arc;

use campaign_core::auth::AuthContext;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::{Campaign, CampaignCounters, CampaignGroup, CampaignStatus};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{validate_schedule, CampaignEngine};
use crate::lifecycle::{CampaignAction, CampaignStateMachine};
use crate::models::{CreateGroupRequest, GroupActionResult, GroupView, SkippedCampaign};

/// Aggregate status of a group from its children's statuses. The checks
/// are a strict priority cascade: sending, paused, all cancelled, all
/// completed, any scheduled, otherwise draft. No children reads as draft.
pub fn derive_group_status(children: &[CampaignStatus]) -> CampaignStatus {
    use campaign_core::types::CampaignStatus as S;

    let any = |s: S| children.contains(&s);
    let all = |s: S| !children.is_empty() && children.iter().all(|c| *c == s);

    if any(S::Sending) {
        S::Sending
    } else if any(S::Paused) {
        S::Paused
    } else if all(S::Cancelled) {
        S::Cancelled
    } else if all(S::Completed) {
        S::Completed
    } else if any(S::Scheduled) {
        S::Scheduled
    } else {
        S::Draft
    }
}

pub struct GroupCoordinator {
    engine: Arc<CampaignEngine>,
}

impl GroupCoordinator {
    pub fn new(engine: Arc<CampaignEngine>) -> Self {
        Self { engine }
    }

    /// Create a group and one campaign per workspace. Every workspace is
    /// checked before anything is written; one failure creates nothing.
    pub fn create_group(
        &self,
        auth: &AuthContext,
        req: CreateGroupRequest,
    ) -> CampaignResult<GroupView> {
        let mut seen = HashSet::new();
        let workspace_ids: Vec<Uuid> = req
            .workspace_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if workspace_ids.len() < 2 {
            return Err(CampaignError::validation(
                "A campaign group needs at least two distinct workspaces",
            ));
        }
        let name = req.name.trim().to_string();
        let template = req.message_template.trim().to_string();
        if name.is_empty() || template.is_empty() {
            return Err(CampaignError::validation(
                "name and message_template must not be empty",
            ));
        }

        for ws in &workspace_ids {
            auth.require_member(ws)?;
            let workspace = self.engine.require_workspace(ws)?;
            if !workspace.can_send() {
                return Err(CampaignError::forbidden(format!(
                    "Workspace {} has no outbound number provisioned",
                    workspace.name
                )));
            }
        }

        let engine_config = self.engine.config();
        let audience = req
            .audience
            .into_spec(engine_config.missing_audience_parameter)?;
        let now = Utc::now();
        let scheduled_at = validate_schedule(req.scheduled_at, now)?;
        let status = if scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let group = CampaignGroup {
            id: Uuid::new_v4(),
            name: name.clone(),
            created_by: auth.user_id,
            created_at: now,
        };
        let children: Vec<Campaign> = workspace_ids
            .iter()
            .map(|ws| Campaign {
                id: Uuid::new_v4(),
                workspace_id: *ws,
                group_id: Some(group.id),
                name: name.clone(),
                message_template: template.clone(),
                audience: audience.clone(),
                frequency_cap_days: req.frequency_cap_days.filter(|d| *d > 0),
                scheduled_at,
                status,
                counters: CampaignCounters::default(),
                created_by: auth.user_id,
                created_at: now,
                updated_at: now,
                started_at: None,
                completed_at: None,
            })
            .collect();

        self.engine.store().insert_group(group.clone(), children);
        info!(
            group_id = %group.id,
            workspaces = workspace_ids.len(),
            "Campaign group created"
        );
        metrics::counter!("campaign_groups.created").increment(1);
        Ok(self.view(auth, group))
    }

    pub fn get_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<GroupView> {
        let group = self.require_group(id)?;
        let view = self.view(auth, group);
        if view.campaigns.is_empty() && view.created_by != auth.user_id {
            return Err(CampaignError::not_found("Campaign group"));
        }
        Ok(view)
    }

    /// Groups the caller authored or has at least one visible child in.
    pub fn list_groups(&self, auth: &AuthContext) -> Vec<GroupView> {
        self.engine
            .store()
            .list_groups()
            .into_iter()
            .map(|g| self.view(auth, g))
            .filter(|v| v.created_by == auth.user_id || !v.campaigns.is_empty())
            .collect()
    }

    pub fn launch_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<GroupActionResult> {
        self.apply(auth, id, CampaignAction::Launch, |engine, child, now| {
            engine.launch_unchecked(child, now)
        })
    }

    pub fn pause_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<GroupActionResult> {
        self.apply(auth, id, CampaignAction::Pause, |engine, child, now| {
            engine.pause_unchecked(child, now)
        })
    }

    pub fn resume_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<GroupActionResult> {
        self.apply(auth, id, CampaignAction::Resume, |engine, child, now| {
            engine.resume_unchecked(child, now)
        })
    }

    pub fn cancel_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<GroupActionResult> {
        self.apply(auth, id, CampaignAction::Cancel, |engine, child, now| {
            engine.cancel_unchecked(child, now)
        })
    }

    /// Delete a group and all of its campaigns. Refused while any child is
    /// sending.
    pub fn delete_group(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<()> {
        let group = self.require_group(id)?;
        require_creator(auth, &group, "delete")?;
        let store = self.engine.store();
        let children = store.campaigns_in_group(id);
        if children.iter().any(|c| c.status == CampaignStatus::Sending) {
            return Err(CampaignError::precondition(
                "Cannot delete a group while any of its campaigns is sending",
            ));
        }
        self.remove_children(id, &children)?;
        store.remove_group(id);
        info!(group_id = %id, campaigns = children.len(), "Campaign group deleted");
        Ok(())
    }

    /// Remove each child under its own guard. A child that started sending
    /// after the check is kept, and the group row stays so the survivors
    /// remain reachable; the error names them.
    fn remove_children(&self, group_id: &Uuid, children: &[Campaign]) -> CampaignResult<()> {
        let store = self.engine.store();
        let mut kept = Vec::new();
        for child in children {
            match store.remove_campaign_if(&child.id, |c| {
                CampaignStateMachine::ensure_deletable(c.status)
            }) {
                Ok(_) | Err(CampaignError::NotFound(_)) => {}
                Err(CampaignError::Precondition(_)) => kept.push(child.id),
                Err(e) => return Err(e),
            }
        }
        if kept.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = kept.iter().map(Uuid::to_string).collect();
        warn!(
            group_id = %group_id,
            removed = children.len() - kept.len(),
            kept = ?ids,
            "Campaign group partially deleted"
        );
        Err(CampaignError::precondition(format!(
            "Campaign group partially deleted; campaigns still sending: {}",
            ids.join(", ")
        )))
    }

    /// Run `op` on every child the caller can see and whose current status
    /// admits `action`; everything else is reported as skipped.
    fn apply<F>(
        &self,
        auth: &AuthContext,
        id: &Uuid,
        action: CampaignAction,
        op: F,
    ) -> CampaignResult<GroupActionResult>
    where
        F: Fn(&CampaignEngine, &Uuid, DateTime<Utc>) -> CampaignResult<Campaign>,
    {
        let group = self.require_group(id)?;
        require_creator(auth, &group, action.as_str())?;
        let now = Utc::now();

        let mut affected = Vec::new();
        let mut skipped = Vec::new();
        for child in self.engine.store().campaigns_in_group(id) {
            if !auth.is_member(&child.workspace_id) {
                skipped.push(SkippedCampaign {
                    campaign_id: child.id,
                    reason: format!("No access to workspace {}", child.workspace_id),
                });
                continue;
            }
            if !CampaignStateMachine::can(child.status, action) {
                skipped.push(SkippedCampaign {
                    campaign_id: child.id,
                    reason: format!("Campaign is {}", child.status),
                });
                continue;
            }
            // The status may have moved since the listing; the guarded
            // operation re-checks under the row lock.
            match op(&self.engine, &child.id, now) {
                Ok(_) => affected.push(child.id),
                Err(e) => {
                    warn!(group_id = %id, campaign_id = %child.id, error = %e, "Group action skipped child");
                    skipped.push(SkippedCampaign {
                        campaign_id: child.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if affected.is_empty() {
            return Err(CampaignError::precondition(format!(
                "No campaigns in this group can {}",
                action.as_str()
            )));
        }
        info!(
            group_id = %id,
            action = action.as_str(),
            affected = affected.len(),
            skipped = skipped.len(),
            "Group action applied"
        );
        metrics::counter!("campaign_groups.actions", "action" => action.as_str()).increment(1);
        Ok(GroupActionResult {
            group: self.view(auth, group),
            affected,
            skipped,
        })
    }

    fn require_group(&self, id: &Uuid) -> CampaignResult<CampaignGroup> {
        self.engine
            .store()
            .get_group(id)
            .ok_or_else(|| CampaignError::not_found("Campaign group"))
    }

    fn view(&self, auth: &AuthContext, group: CampaignGroup) -> GroupView {
        let campaigns: Vec<Campaign> = self
            .engine
            .store()
            .campaigns_in_group(&group.id)
            .into_iter()
            .filter(|c| auth.is_member(&c.workspace_id))
            .collect();
        let statuses: Vec<CampaignStatus> = campaigns.iter().map(|c| c.status).collect();
        let mut totals = CampaignCounters::default();
        for c in &campaigns {
            totals += c.counters;
        }
        GroupView {
            id: group.id,
            name: group.name,
            created_by: group.created_by,
            created_at: group.created_at,
            status: derive_group_status(&statuses),
            totals,
            campaigns,
        }
    }
}

fn require_creator(auth: &AuthContext, group: &CampaignGroup, verb: &str) -> CampaignResult<()> {
    if group.created_by == auth.user_id {
        Ok(())
    } else {
        Err(CampaignError::forbidden(format!(
            "Only the group creator can {verb} it"
        )))
    }
}
