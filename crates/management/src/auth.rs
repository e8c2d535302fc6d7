//! Caller identity for the REST API.
//!
//! Development: the caller is named by the `x-user-id` header and its
//! workspace memberships are read from the store. Production: replace with
//! JWT validation in front of this extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use campaign_core::auth::AuthContext;
use uuid::Uuid;

use crate::handlers::ManagementState;
use crate::models::ErrorResponse;

pub const USER_HEADER: &str = "x-user-id";

/// Extracted caller, scoped to the workspaces they belong to.
pub struct Caller(pub AuthContext);

#[axum::async_trait]
impl FromRequestParts<ManagementState> for Caller {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ManagementState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                unauthorized("missing_auth", format!("{USER_HEADER} header required"))
            })?;
        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| unauthorized("invalid_user", format!("{USER_HEADER} must be a UUID")))?;

        let workspaces = state.engine.store().memberships(&user_id);
        Ok(Caller(AuthContext::new(user_id, workspaces)))
    }
}

fn unauthorized(error: &str, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}
