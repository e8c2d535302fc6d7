//! Campaign management REST backend: campaigns, audience preview,
//! recipients, worker status intake and campaign groups.
//!
//! Data stored in DashMap (development); swap to PostgreSQL for production.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod router;

pub use auth::Caller;
pub use handlers::ManagementState;
pub use router::management_router;
