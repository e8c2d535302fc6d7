//! Wire shapes specific to the REST surface. Engine request/response types
//! are re-used from `campaign-orchestration` as-is.

use campaign_core::types::RecipientStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// A worker's report for one recipient; the campaign comes from the path.
#[derive(Debug, Deserialize)]
pub struct StatusReportRequest {
    pub contact_id: Uuid,
    pub status: RecipientStatus,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<usize>,
}
