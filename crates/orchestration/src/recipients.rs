//! Recipient ledger operations: paged listings for the UI, status intake
//! from the send workers, and the pull side of the dispatch handoff.

use campaign_core::auth::AuthContext;
use campaign_core::dispatch::RecipientStatusUpdate;
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::{CampaignStatus, RecipientStatus};
use campaign_store::RowUpdate;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{mark_completed, CampaignEngine};
use crate::models::{
    DispatchBatch, DispatchTarget, RecipientListing, RecipientPage, RecipientQuery,
    StatusUpdateOutcome,
};

/// Error recorded on a pending row whose contact can no longer be messaged.
pub const INELIGIBLE_MESSAGE: &str = "Contact is no longer reachable";

impl CampaignEngine {
    /// One page of a campaign's recipients joined with contact name and
    /// phone. Pages are 1-based; the page size is clamped to the configured
    /// maximum.
    pub fn get_recipients(
        &self,
        auth: &AuthContext,
        campaign_id: &Uuid,
        query: RecipientQuery,
    ) -> CampaignResult<RecipientPage> {
        let campaign = self.authorized_campaign(auth, campaign_id)?;
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let offset = (page - 1).saturating_mul(page_size);

        let (rows, total) = self
            .store
            .read_ledger(campaign_id, |l| l.page(query.status, offset, page_size));
        let ids: Vec<Uuid> = rows.iter().map(|r| r.contact_id).collect();
        let contacts = self.store.contacts_by_id(&campaign.workspace_id, &ids);

        let recipients = rows
            .into_iter()
            .map(|recipient| {
                let contact = contacts.get(&recipient.contact_id);
                RecipientListing {
                    contact_name: contact.map(|c| c.name.clone()),
                    contact_phone: contact.and_then(|c| c.phone.clone()),
                    recipient,
                }
            })
            .collect();

        Ok(RecipientPage {
            recipients,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
        })
    }

    /// Apply a worker's status report. Reports that would move a row
    /// backwards are ignored. Counters are recomputed and the campaign
    /// completes once it is sending with nothing left pending.
    pub fn apply_status_update(
        &self,
        update: RecipientStatusUpdate,
    ) -> CampaignResult<StatusUpdateOutcome> {
        let campaign = self.store.require_campaign(&update.campaign_id)?;
        if update.status == RecipientStatus::Pending {
            return Err(CampaignError::validation(
                "Workers cannot report a recipient as pending",
            ));
        }

        let row = self.store.with_ledger(&update.campaign_id, |l| {
            l.apply_status(
                &update.contact_id,
                update.status,
                update.occurred_at,
                update.error_message.clone(),
            )
        });
        let (applied, recipient_status) = match row {
            RowUpdate::Applied { from, to } => {
                debug!(
                    campaign_id = %update.campaign_id,
                    contact_id = %update.contact_id,
                    from = %from,
                    to = %to,
                    "Recipient status applied"
                );
                (true, to)
            }
            RowUpdate::Stale { current } => {
                debug!(
                    campaign_id = %update.campaign_id,
                    contact_id = %update.contact_id,
                    reported = %update.status,
                    current = %current,
                    "Stale recipient status ignored"
                );
                (false, current)
            }
            RowUpdate::UnknownContact => return Err(CampaignError::not_found("Recipient")),
        };

        if applied && recipient_status.counts_toward_cap() {
            self.store
                .touch_contact(&campaign.workspace_id, &update.contact_id, update.occurred_at);
        }

        let now = Utc::now();
        let (campaign_status, counters) = self.store.modify_campaign(&update.campaign_id, |c| {
            let pending = self.refresh_counters(c);
            if c.status == CampaignStatus::Sending && pending == 0 {
                mark_completed(c, now)?;
                info!(
                    campaign_id = %c.id,
                    sent = c.counters.sent_count,
                    delivered = c.counters.delivered_count,
                    "Campaign completed"
                );
                metrics::counter!("campaigns.completed").increment(1);
            }
            c.updated_at = now;
            Ok((c.status, c.counters))
        })?;

        metrics::counter!(
            "recipients.status_updates",
            "status" => update.status.to_string(),
            "applied" => applied.to_string()
        )
        .increment(1);

        Ok(StatusUpdateOutcome {
            applied,
            recipient_status,
            campaign_status,
            counters,
        })
    }

    /// The next pending recipients a worker should message, in audience
    /// order. Returns no targets unless the campaign is sending. Pending
    /// rows whose contact has since opted out or lost its phone number are
    /// failed instead of handed out.
    pub fn next_dispatch_batch(
        &self,
        campaign_id: &Uuid,
        limit: Option<usize>,
    ) -> CampaignResult<DispatchBatch> {
        let campaign = self.store.require_campaign(campaign_id)?;
        let from_number = self
            .store
            .get_workspace(&campaign.workspace_id)
            .and_then(|w| w.outbound_number);
        let mut batch = DispatchBatch {
            campaign_id: campaign.id,
            status: campaign.status,
            from_number,
            message_template: campaign.message_template.clone(),
            targets: Vec::new(),
        };
        if campaign.status != CampaignStatus::Sending {
            return Ok(batch);
        }

        let limit = limit
            .unwrap_or(self.config.dispatch_batch_limit)
            .clamp(1, self.config.dispatch_batch_limit.max(1));
        let (rows, _) = self.store.read_ledger(campaign_id, |l| {
            l.page(Some(RecipientStatus::Pending), 0, limit)
        });
        let ids: Vec<Uuid> = rows.iter().map(|r| r.contact_id).collect();
        let contacts = self.store.contacts_by_id(&campaign.workspace_id, &ids);

        let mut unreachable = Vec::new();
        for row in rows {
            match contacts.get(&row.contact_id) {
                Some(c) if !c.opted_out && c.has_phone() => batch.targets.push(DispatchTarget {
                    contact_id: c.id,
                    name: c.name.clone(),
                    phone: c.phone.clone().unwrap_or_default(),
                }),
                _ => unreachable.push(row.contact_id),
            }
        }

        for contact_id in unreachable {
            warn!(campaign_id = %campaign_id, contact_id = %contact_id, "Recipient no longer reachable");
            let outcome = self.apply_status_update(RecipientStatusUpdate {
                campaign_id: *campaign_id,
                contact_id,
                status: RecipientStatus::Failed,
                occurred_at: Utc::now(),
                error_message: Some(INELIGIBLE_MESSAGE.to_string()),
            })?;
            batch.status = outcome.campaign_status;
        }

        Ok(batch)
    }
}
