pub mod audience;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod types;

pub use audience::{AudienceRequest, AudienceSpec, AudienceType, MissingParameterPolicy};
pub use auth::AuthContext;
pub use config::AppConfig;
pub use dispatch::{DispatchEvent, DispatchQueue, DispatchReason, RecipientStatusUpdate};
pub use error::{CampaignError, CampaignResult};
