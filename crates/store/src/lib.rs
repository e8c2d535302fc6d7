//! Shared store for the campaign engine: directory data (workspaces,
//! memberships, contacts), campaigns, groups and the recipient ledger.
//!
//! Data lives in DashMap; the API mirrors the conditional updates a
//! relational backend would use.

pub mod ledger;
pub mod seed;
pub mod store;

pub use ledger::{LedgerTable, RowUpdate};
pub use seed::DEMO_USER_ID;
pub use store::CampaignStore;
