//! Audience targeting: eligibility predicates, launch-time resolution,
//! bounded previews and cross-campaign frequency capping.

pub mod frequency_cap;
pub mod predicates;
pub mod resolver;

pub use frequency_cap::{CapExclusions, FrequencyCapFilter};
pub use predicates::{AudiencePredicate, Restriction};
pub use resolver::{AudiencePreview, AudienceResolver, ResolvedAudience};
