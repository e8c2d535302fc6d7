//! Management API router: mounts all endpoints under /api/v1.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{self, ManagementState};

/// Build the router with all endpoints. Middleware is layered by the
/// binary.
pub fn management_router(state: ManagementState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Workspace-scoped
        .route(
            "/api/v1/workspaces/:workspace_id/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route(
            "/api/v1/workspaces/:workspace_id/audience/preview",
            post(handlers::preview_audience),
        )
        // Campaigns
        .route(
            "/api/v1/campaigns/:id",
            get(handlers::get_campaign)
                .put(handlers::update_campaign)
                .delete(handlers::delete_campaign),
        )
        .route("/api/v1/campaigns/:id/launch", post(handlers::launch_campaign))
        .route("/api/v1/campaigns/:id/pause", post(handlers::pause_campaign))
        .route("/api/v1/campaigns/:id/resume", post(handlers::resume_campaign))
        .route("/api/v1/campaigns/:id/cancel", post(handlers::cancel_campaign))
        // Recipients and worker intake
        .route("/api/v1/campaigns/:id/recipients", get(handlers::list_recipients))
        .route("/api/v1/campaigns/:id/recipients/status", post(handlers::report_status))
        .route("/api/v1/campaigns/:id/dispatch/batch", post(handlers::dispatch_batch))
        // Campaign groups
        .route(
            "/api/v1/campaign-groups",
            get(handlers::list_groups).post(handlers::create_group),
        )
        .route(
            "/api/v1/campaign-groups/:id",
            get(handlers::get_group).delete(handlers::delete_group),
        )
        .route("/api/v1/campaign-groups/:id/launch", post(handlers::launch_group))
        .route("/api/v1/campaign-groups/:id/pause", post(handlers::pause_group))
        .route("/api/v1/campaign-groups/:id/resume", post(handlers::resume_group))
        .route("/api/v1/campaign-groups/:id/cancel", post(handlers::cancel_group))
        .with_state(state)
}
