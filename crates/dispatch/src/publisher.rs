//! NATS-backed dispatch queue. Enqueueing never blocks: events go into a
//! bounded channel and a background task publishes them to
//! `<prefix>.campaign-dispatch`.

use campaign_core::dispatch::{DispatchEvent, DispatchQueue};
use campaign_core::error::{CampaignError, CampaignResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct NatsDispatchQueue {
    sender: mpsc::Sender<DispatchEvent>,
}

impl NatsDispatchQueue {
    /// Spawn the publisher task on the current runtime.
    pub fn spawn(client: async_nats::Client, subject: String, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<DispatchEvent>(capacity.max(1));

        tokio::spawn(async move {
            Publisher { client, subject }.run(receiver).await;
        });

        info!(capacity, "NATS dispatch queue initialized");
        Self { sender }
    }

    fn from_sender(sender: mpsc::Sender<DispatchEvent>) -> Self {
        Self { sender }
    }
}

impl DispatchQueue for NatsDispatchQueue {
    fn enqueue(&self, event: DispatchEvent) -> CampaignResult<()> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) => {
                CampaignError::Dispatch(format!("queue full, dropped trigger for {}", ev.campaign_id))
            }
            mpsc::error::TrySendError::Closed(_) => {
                CampaignError::Dispatch("publisher task has stopped".into())
            }
        })
    }
}

struct Publisher {
    client: async_nats::Client,
    subject: String,
}

impl Publisher {
    async fn run(self, mut receiver: mpsc::Receiver<DispatchEvent>) {
        info!(subject = %self.subject, "Dispatch publisher started");
        while let Some(event) = receiver.recv().await {
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => {
                    error!(campaign_id = %event.campaign_id, error = %e, "Failed to serialize dispatch event");
                    continue;
                }
            };
            match self.client.publish(self.subject.clone(), payload.into()).await {
                Ok(()) => {
                    metrics::counter!("dispatch.published").increment(1);
                    debug!(
                        campaign_id = %event.campaign_id,
                        reason = ?event.reason,
                        "Dispatch event published"
                    );
                }
                Err(e) => {
                    metrics::counter!("dispatch.publish_errors").increment(1);
                    error!(campaign_id = %event.campaign_id, error = %e, "Failed to publish dispatch event");
                }
            }
        }
        warn!(subject = %self.subject, "Dispatch publisher stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campaign_core::dispatch::DispatchReason;
    use uuid::Uuid;

    fn event() -> DispatchEvent {
        DispatchEvent::new(Uuid::new_v4(), Uuid::new_v4(), DispatchReason::Launch, 3)
    }

    #[test]
    fn enqueue_fails_when_channel_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = NatsDispatchQueue::from_sender(tx);
        queue.enqueue(event()).unwrap();
        let err = queue.enqueue(event()).unwrap_err();
        assert!(matches!(err, CampaignError::Dispatch(_)));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn enqueue_fails_when_publisher_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let queue = NatsDispatchQueue::from_sender(tx);
        let err = queue.enqueue(event()).unwrap_err();
        assert_eq!(err.to_string(), "Dispatch error: publisher task has stopped");
    }
}
