//! Campaign engine: creation, editing, audience preview and the guarded
//! lifecycle operations (launch, pause, resume, cancel, delete).
//!
//! Every status change runs inside [`CampaignStore::modify_campaign`]: the
//! guard reads the current status and the new status is written under the
//! same row lock, so two concurrent launches cannot both pass.

use std::sync::Arc;

use campaign_audience::{AudiencePreview, AudienceResolver};
use campaign_core::audience::check_window_days;
use campaign_core::auth::AuthContext;
use campaign_core::config::EngineConfig;
use campaign_core::dispatch::{DispatchEvent, DispatchQueue, DispatchReason};
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::{Campaign, CampaignCounters, CampaignStatus, Workspace};
use campaign_store::CampaignStore;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::lifecycle::{CampaignAction, CampaignStateMachine};
use crate::models::{CreateCampaignRequest, PreviewAudienceRequest, UpdateCampaignRequest};

/// Error recorded on recipients that were still pending when their
/// campaign was cancelled.
pub const CANCELLED_MESSAGE: &str = "Campaign cancelled";

/// Launch re-resolves when the audience is edited between resolution and
/// recording; give up after this many retries.
const MAX_LAUNCH_ATTEMPTS: usize = 3;

pub struct CampaignEngine {
    pub(crate) store: Arc<CampaignStore>,
    pub(crate) resolver: AudienceResolver,
    pub(crate) dispatch: Arc<dyn DispatchQueue>,
    pub(crate) config: EngineConfig,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<CampaignStore>,
        dispatch: Arc<dyn DispatchQueue>,
        config: EngineConfig,
    ) -> Self {
        info!(
            preview_sample_size = config.preview_sample_size,
            missing_audience_parameter = ?config.missing_audience_parameter,
            "Campaign engine initialized"
        );
        Self {
            resolver: AudienceResolver::new(config.preview_sample_size),
            store,
            dispatch,
            config,
        }
    }

    pub fn store(&self) -> &Arc<CampaignStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── Reads ─────────────────────────────────────────────────────────────

    pub fn get_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)
    }

    pub fn list_campaigns(
        &self,
        auth: &AuthContext,
        workspace_id: &Uuid,
    ) -> CampaignResult<Vec<Campaign>> {
        auth.require_member(workspace_id)?;
        Ok(self.store.campaigns_in_workspace(workspace_id))
    }

    pub fn preview_audience(
        &self,
        auth: &AuthContext,
        workspace_id: Uuid,
        req: PreviewAudienceRequest,
    ) -> CampaignResult<AudiencePreview> {
        auth.require_member(&workspace_id)?;
        self.require_workspace(&workspace_id)?;
        let spec = req
            .audience
            .into_spec(self.config.missing_audience_parameter)?;
        Ok(self.resolver.preview(
            &self.store,
            workspace_id,
            &spec,
            normalize_cap(req.frequency_cap_days)?,
            Utc::now(),
        ))
    }

    // ─── Create / edit ─────────────────────────────────────────────────────

    /// Create a campaign in `draft`, or `scheduled` when a future send time
    /// is given.
    pub fn create_campaign(
        &self,
        auth: &AuthContext,
        workspace_id: Uuid,
        req: CreateCampaignRequest,
    ) -> CampaignResult<Campaign> {
        auth.require_member(&workspace_id)?;
        self.require_workspace(&workspace_id)?;
        let now = Utc::now();
        let name = required_text(&req.name, "name")?;
        let message_template = required_text(&req.message_template, "message_template")?;
        let audience = req
            .audience
            .into_spec(self.config.missing_audience_parameter)?;
        let scheduled_at = validate_schedule(req.scheduled_at, now)?;
        let frequency_cap_days = normalize_cap(req.frequency_cap_days)?;

        let campaign = Campaign {
            id: Uuid::new_v4(),
            workspace_id,
            group_id: None,
            name,
            message_template,
            audience,
            frequency_cap_days,
            scheduled_at,
            status: if scheduled_at.is_some() {
                CampaignStatus::Scheduled
            } else {
                CampaignStatus::Draft
            },
            counters: CampaignCounters::default(),
            created_by: auth.user_id,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        self.store.insert_campaign(campaign.clone());

        info!(
            campaign_id = %campaign.id,
            workspace_id = %workspace_id,
            status = %campaign.status,
            "Campaign created"
        );
        metrics::counter!("campaigns.created").increment(1);
        Ok(campaign)
    }

    /// Edit a draft or scheduled campaign. Setting a future schedule moves a
    /// draft to `scheduled`; clearing it moves it back to `draft`.
    pub fn update_campaign(
        &self,
        auth: &AuthContext,
        id: &Uuid,
        req: UpdateCampaignRequest,
    ) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)?;
        let now = Utc::now();

        if req.clear_schedule && req.scheduled_at.is_some() {
            return Err(CampaignError::validation(
                "Cannot set and clear the schedule in the same request",
            ));
        }
        let name = req.name.as_deref().map(|n| required_text(n, "name")).transpose()?;
        let template = req
            .message_template
            .as_deref()
            .map(|t| required_text(t, "message_template"))
            .transpose()?;
        let audience = req
            .audience
            .map(|a| a.into_spec(self.config.missing_audience_parameter))
            .transpose()?;
        let scheduled_at = validate_schedule(req.scheduled_at, now)?;
        let frequency_cap_days = normalize_cap(req.frequency_cap_days)?;

        self.store.modify_campaign(id, |c| {
            let mut next = CampaignStateMachine::next_status(c.status, CampaignAction::Edit)?;
            if req.clear_schedule {
                next = CampaignStateMachine::next_status(c.status, CampaignAction::Unschedule)?;
                c.scheduled_at = None;
            } else if let Some(at) = scheduled_at {
                next = CampaignStateMachine::next_status(c.status, CampaignAction::Schedule)?;
                c.scheduled_at = Some(at);
            }

            if let Some(name) = name {
                c.name = name;
            }
            if let Some(template) = template {
                c.message_template = template;
            }
            if let Some(audience) = audience {
                c.audience = audience;
            }
            if req.clear_frequency_cap {
                c.frequency_cap_days = None;
            } else if req.frequency_cap_days.is_some() {
                c.frequency_cap_days = frequency_cap_days;
            }
            c.status = next;
            c.updated_at = now;
            Ok(c.clone())
        })
        .map_err(|e| rejected(id, CampaignAction::Edit, e))
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────

    pub fn launch_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)?;
        self.launch_unchecked(id, Utc::now())
    }

    pub fn pause_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)?;
        self.pause_unchecked(id, Utc::now())
    }

    pub fn resume_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)?;
        self.resume_unchecked(id, Utc::now())
    }

    pub fn cancel_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<Campaign> {
        self.authorized_campaign(auth, id)?;
        self.cancel_unchecked(id, Utc::now())
    }

    /// Delete a campaign and its recipient rows. Refused while sending.
    pub fn delete_campaign(&self, auth: &AuthContext, id: &Uuid) -> CampaignResult<()> {
        self.authorized_campaign(auth, id)?;
        let removed = self
            .store
            .remove_campaign_if(id, |c| CampaignStateMachine::ensure_deletable(c.status))
            .map_err(|e| {
                if matches!(e, CampaignError::Precondition(_)) {
                    warn!(campaign_id = %id, reason = %e, "Delete rejected");
                }
                e
            })?;
        info!(campaign_id = %id, status = %removed.status, "Campaign deleted");
        metrics::counter!("campaigns.deleted").increment(1);
        Ok(())
    }

    /// Launch every scheduled campaign whose time has come. Failures are
    /// logged and do not stop the sweep.
    pub fn launch_due_scheduled(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut launched = Vec::new();
        for id in self.store.due_scheduled(now) {
            match self.launch_unchecked(&id, now) {
                Ok(c) => launched.push(c.id),
                Err(e) => warn!(campaign_id = %id, error = %e, "Scheduled launch failed"),
            }
        }
        if !launched.is_empty() {
            info!(count = launched.len(), "Scheduled campaigns launched");
        }
        launched
    }

    /// Launch: resolve the audience, then mark `sending` and record the
    /// recipients in one step under the row lock, then hand off to the
    /// workers. A campaign is never `sending` without its recipient rows.
    pub(crate) fn launch_unchecked(&self, id: &Uuid, now: DateTime<Utc>) -> CampaignResult<Campaign> {
        let mut attempts = 0;
        let (campaign, pending, created, capped) = loop {
            let snapshot = self.store.require_campaign(id)?;
            CampaignStateMachine::next_status(snapshot.status, CampaignAction::Launch)
                .map_err(|e| rejected(id, CampaignAction::Launch, e))?;
            let workspace = self.require_workspace(&snapshot.workspace_id)?;
            if !workspace.can_send() {
                return Err(CampaignError::forbidden(format!(
                    "Workspace {} has no outbound number provisioned",
                    workspace.name
                )));
            }

            // Resolution scans other campaigns' ledgers, so it runs outside
            // the row lock.
            let audience = self.resolver.resolve(
                &self.store,
                snapshot.workspace_id,
                &snapshot.audience,
                snapshot.frequency_cap_days,
                now,
            );

            let recorded = self
                .store
                .modify_campaign(id, |c| {
                    let next = CampaignStateMachine::next_status(c.status, CampaignAction::Launch)?;
                    if c.audience != snapshot.audience
                        || c.frequency_cap_days != snapshot.frequency_cap_days
                    {
                        return Ok(None);
                    }
                    let created = self.store.with_ledger(id, |l| {
                        l.insert_pending(*id, audience.contact_ids.iter().copied(), now)
                    });
                    c.status = next;
                    c.started_at = Some(now);
                    c.updated_at = now;
                    let pending = self.refresh_counters(c);
                    if pending == 0 {
                        mark_completed(c, now)?;
                    }
                    Ok(Some((c.clone(), pending, created)))
                })
                .map_err(|e| rejected(id, CampaignAction::Launch, e))?;

            match recorded {
                Some((campaign, pending, created)) => {
                    break (campaign, pending, created, audience.capped)
                }
                None if attempts < MAX_LAUNCH_ATTEMPTS => {
                    attempts += 1;
                    debug!(campaign_id = %id, attempts, "Audience edited during launch, resolving again");
                }
                None => {
                    return Err(rejected(
                        id,
                        CampaignAction::Launch,
                        CampaignError::precondition("Campaign was edited while launching"),
                    ))
                }
            }
        };

        info!(
            campaign_id = %id,
            workspace_id = %campaign.workspace_id,
            recipients = created,
            capped,
            status = %campaign.status,
            "Campaign launched"
        );
        metrics::counter!("campaigns.launched").increment(1);
        metrics::counter!("recipients.created").increment(created as u64);

        if campaign.status == CampaignStatus::Sending && pending > 0 {
            self.handoff(&campaign, DispatchReason::Launch, pending);
        }
        Ok(campaign)
    }

    pub(crate) fn pause_unchecked(&self, id: &Uuid, now: DateTime<Utc>) -> CampaignResult<Campaign> {
        let campaign = self.store.modify_campaign(id, |c| {
            c.status = CampaignStateMachine::next_status(c.status, CampaignAction::Pause)?;
            c.updated_at = now;
            Ok(c.clone())
        })
        .map_err(|e| rejected(id, CampaignAction::Pause, e))?;
        info!(campaign_id = %id, to = %campaign.status, "Campaign paused");
        metrics::counter!("campaigns.paused").increment(1);
        Ok(campaign)
    }

    /// Resume sending. A campaign whose recipients all settled while it was
    /// paused completes straight away instead of waiting on the workers.
    pub(crate) fn resume_unchecked(&self, id: &Uuid, now: DateTime<Utc>) -> CampaignResult<Campaign> {
        let (campaign, pending) = self.store.modify_campaign(id, |c| {
            c.status = CampaignStateMachine::next_status(c.status, CampaignAction::Resume)?;
            c.updated_at = now;
            let pending = self.refresh_counters(c);
            if pending == 0 {
                mark_completed(c, now)?;
            }
            Ok((c.clone(), pending))
        })
        .map_err(|e| rejected(id, CampaignAction::Resume, e))?;
        info!(campaign_id = %id, to = %campaign.status, pending, "Campaign resumed");

        if campaign.status == CampaignStatus::Sending {
            self.handoff(&campaign, DispatchReason::Resume, pending);
        }
        Ok(campaign)
    }

    /// Cancel and fail every pending recipient in the same step.
    pub(crate) fn cancel_unchecked(&self, id: &Uuid, now: DateTime<Utc>) -> CampaignResult<Campaign> {
        let (campaign, failed) = self.store.modify_campaign(id, |c| {
            let next = CampaignStateMachine::next_status(c.status, CampaignAction::Cancel)?;
            let failed = self
                .store
                .with_ledger(id, |l| l.fail_pending(CANCELLED_MESSAGE, now));
            c.status = next;
            c.updated_at = now;
            self.refresh_counters(c);
            Ok((c.clone(), failed))
        })
        .map_err(|e| rejected(id, CampaignAction::Cancel, e))?;
        info!(
            campaign_id = %id,
            failed_pending = failed,
            "Campaign cancelled"
        );
        metrics::counter!("campaigns.cancelled").increment(1);
        Ok(campaign)
    }

    // ─── Helpers ───────────────────────────────────────────────────────────

    pub(crate) fn authorized_campaign(
        &self,
        auth: &AuthContext,
        id: &Uuid,
    ) -> CampaignResult<Campaign> {
        let campaign = self.store.require_campaign(id)?;
        auth.require_member(&campaign.workspace_id)?;
        Ok(campaign)
    }

    pub(crate) fn require_workspace(&self, id: &Uuid) -> CampaignResult<Workspace> {
        self.store
            .get_workspace(id)
            .ok_or_else(|| CampaignError::not_found("Workspace"))
    }

    /// Recompute counters from the ledger and return the pending count.
    /// Call with the campaign row locked.
    pub(crate) fn refresh_counters(&self, c: &mut Campaign) -> usize {
        let (counters, pending) = self
            .store
            .read_ledger(&c.id, |l| (l.counters(), l.pending_count()));
        c.counters = counters;
        pending
    }

    /// Enqueue the trigger for the workers. The campaign is already marked
    /// `sending`; a failed enqueue is logged and can be retried with
    /// pause/resume.
    fn handoff(&self, campaign: &Campaign, reason: DispatchReason, pending: usize) {
        let event = DispatchEvent::new(
            campaign.id,
            campaign.workspace_id,
            reason,
            pending as u64,
        );
        match self.dispatch.enqueue(event) {
            Ok(()) => {
                metrics::counter!("dispatch.enqueued").increment(1);
                info!(campaign_id = %campaign.id, ?reason, pending, "Dispatch enqueued");
            }
            Err(e) => {
                metrics::counter!("dispatch.dropped").increment(1);
                error!(campaign_id = %campaign.id, error = %e, "Dispatch enqueue failed");
            }
        }
    }
}

/// Log a refused transition and pass the error through.
fn rejected(id: &Uuid, action: CampaignAction, err: CampaignError) -> CampaignError {
    if matches!(err, CampaignError::Precondition(_)) {
        warn!(campaign_id = %id, action = action.as_str(), reason = %err, "Transition rejected");
    }
    err
}

pub(crate) fn mark_completed(c: &mut Campaign, now: DateTime<Utc>) -> CampaignResult<()> {
    c.status = CampaignStateMachine::next_status(c.status, CampaignAction::Complete)?;
    c.completed_at = Some(now);
    c.updated_at = now;
    Ok(())
}

fn required_text(value: &str, field: &str) -> CampaignResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CampaignError::validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

/// A zero-day cap is no cap.
fn normalize_cap(days: Option<u32>) -> CampaignResult<Option<u32>> {
    days.filter(|d| *d > 0)
        .map(|d| check_window_days(d, "frequency_cap_days"))
        .transpose()
}

pub(crate) fn validate_schedule(
    at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CampaignResult<Option<DateTime<Utc>>> {
    match at {
        Some(t) if t <= now => Err(CampaignError::validation(
            "Scheduled time must be in the future",
        )),
        other => Ok(other),
    }
}
