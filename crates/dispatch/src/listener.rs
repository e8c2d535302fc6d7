//! Status listener: consumes recipient status reports from the send
//! workers on `<prefix>.recipient-status` and applies them to the ledger.

use std::sync::Arc;

use campaign_core::dispatch::RecipientStatusUpdate;
use campaign_core::error::CampaignError;
use campaign_orchestration::{CampaignEngine, StatusUpdateOutcome};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Queue group shared by every engine node so each report is applied once.
pub const STATUS_QUEUE_GROUP: &str = "campaign-engine";

pub struct StatusListener {
    node_id: String,
    engine: Arc<CampaignEngine>,
}

impl StatusListener {
    pub fn new(node_id: String, engine: Arc<CampaignEngine>) -> Self {
        Self { node_id, engine }
    }

    pub fn spawn(self, client: async_nats::Client, subject: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(node_id = %self.node_id, subject = %subject, "Status listener subscribing");

            let subscriber = match client
                .queue_subscribe(subject.clone(), STATUS_QUEUE_GROUP.to_string())
                .await
            {
                Ok(sub) => sub,
                Err(e) => {
                    error!(node_id = %self.node_id, error = %e, "Failed to subscribe to status subject");
                    return;
                }
            };

            self.process_messages(subscriber).await;
        })
    }

    async fn process_messages(self, mut subscriber: async_nats::Subscriber) {
        while let Some(msg) = subscriber.next().await {
            // Errors are logged inside; the loop keeps consuming.
            let _ = self.handle(&msg.payload);
        }
        warn!(node_id = %self.node_id, "Status subscription ended");
    }

    /// Decode and apply one report.
    pub fn handle(&self, payload: &[u8]) -> Option<StatusUpdateOutcome> {
        let update: RecipientStatusUpdate = match serde_json::from_slice(payload) {
            Ok(u) => u,
            Err(e) => {
                warn!(node_id = %self.node_id, error = %e, "Failed to deserialize status report");
                metrics::counter!("status_listener.deserialize_errors").increment(1);
                return None;
            }
        };

        match self.engine.apply_status_update(update.clone()) {
            Ok(outcome) => {
                debug!(
                    campaign_id = %update.campaign_id,
                    contact_id = %update.contact_id,
                    applied = outcome.applied,
                    "Status report processed"
                );
                Some(outcome)
            }
            Err(e @ CampaignError::NotFound(_)) => {
                // Campaign deleted or row never created; nothing to retry.
                warn!(campaign_id = %update.campaign_id, contact_id = %update.contact_id, error = %e, "Status report for unknown recipient");
                metrics::counter!("status_listener.unknown").increment(1);
                None
            }
            Err(e) => {
                error!(campaign_id = %update.campaign_id, error = %e, "Status report failed");
                metrics::counter!("status_listener.errors").increment(1);
                None
            }
        }
    }
}
