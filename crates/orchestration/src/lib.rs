pub mod engine;
pub mod groups;
pub mod lifecycle;
pub mod models;
pub mod recipients;

#[cfg(test)]
mod testing;

pub use engine::{CampaignEngine, CANCELLED_MESSAGE};
pub use groups::{derive_group_status, GroupCoordinator};
pub use lifecycle::{CampaignAction, CampaignStateMachine};
pub use models::*;
pub use recipients::INELIGIBLE_MESSAGE;
