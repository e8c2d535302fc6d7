//! Audience specifications: which contacts of a workspace a campaign targets.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

/// Upper bound for day windows (inactivity and frequency cap).
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Reject day windows longer than [`MAX_WINDOW_DAYS`].
pub fn check_window_days(days: u32, field: &str) -> CampaignResult<u32> {
    if days > MAX_WINDOW_DAYS {
        return Err(CampaignError::validation(format!(
            "{field} must be at most {MAX_WINDOW_DAYS} days"
        )));
    }
    Ok(days)
}

/// Declarative audience selection. Each variant carries exactly the
/// parameters it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AudienceSpec {
    #[default]
    All,
    Stage { stage: String },
    Category { category_id: Uuid },
    Inactive { inactive_days: u32 },
}

impl AudienceSpec {
    pub fn kind(&self) -> AudienceType {
        match self {
            AudienceSpec::All => AudienceType::All,
            AudienceSpec::Stage { .. } => AudienceType::Stage,
            AudienceSpec::Category { .. } => AudienceType::Category,
            AudienceSpec::Inactive { .. } => AudienceType::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceType {
    All,
    Stage,
    Category,
    Inactive,
}

/// What to do when a parameterized audience type arrives without its
/// parameter (e.g. `stage` with no stage slug).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingParameterPolicy {
    /// Drop the restriction and target the whole base audience.
    #[default]
    Broaden,
    /// Refuse the request.
    Reject,
}

/// Loosely-shaped audience as it arrives over the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudienceRequest {
    #[serde(rename = "type")]
    pub audience_type: Option<AudienceType>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub inactive_days: Option<u32>,
}

impl AudienceRequest {
    /// Convert into a well-typed [`AudienceSpec`] under the given policy.
    /// A missing type means `all`; a blank stage or zero day window counts
    /// as a missing parameter.
    pub fn into_spec(self, policy: MissingParameterPolicy) -> CampaignResult<AudienceSpec> {
        if let Some(days) = self.inactive_days {
            check_window_days(days, "inactive_days")?;
        }
        let kind = self.audience_type.unwrap_or(AudienceType::All);
        let resolved = match kind {
            AudienceType::All => Some(AudienceSpec::All),
            AudienceType::Stage => self
                .stage
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(|stage| AudienceSpec::Stage { stage }),
            AudienceType::Category => self
                .category_id
                .map(|category_id| AudienceSpec::Category { category_id }),
            AudienceType::Inactive => self
                .inactive_days
                .filter(|d| *d > 0)
                .map(|inactive_days| AudienceSpec::Inactive { inactive_days }),
        };

        match (resolved, policy) {
            (Some(spec), _) => Ok(spec),
            (None, MissingParameterPolicy::Broaden) => {
                tracing::debug!(audience_type = ?kind, "Audience parameter missing, broadening to all");
                Ok(AudienceSpec::All)
            }
            (None, MissingParameterPolicy::Reject) => Err(CampaignError::validation(format!(
                "Audience type {} requires {}",
                kind.as_str(),
                kind.required_parameter()
            ))),
        }
    }
}

impl AudienceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudienceType::All => "all",
            AudienceType::Stage => "stage",
            AudienceType::Category => "category",
            AudienceType::Inactive => "inactive",
        }
    }

    fn required_parameter(&self) -> &'static str {
        match self {
            AudienceType::All => "no parameters",
            AudienceType::Stage => "a stage",
            AudienceType::Category => "a category_id",
            AudienceType::Inactive => "a positive inactive_days",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn req(kind: AudienceType) -> AudienceRequest {
        AudienceRequest {
            audience_type: Some(kind),
            ..AudienceRequest::default()
        }
    }

    #[test]
    fn stage_with_slug_is_kept() {
        let mut r = req(AudienceType::Stage);
        r.stage = Some(" lead ".into());
        let spec = r.into_spec(MissingParameterPolicy::Reject).unwrap();
        assert_eq!(spec, AudienceSpec::Stage { stage: "lead".into() });
    }

    #[test]
    fn missing_parameter_broadens_to_all() {
        let spec = req(AudienceType::Stage)
            .into_spec(MissingParameterPolicy::Broaden)
            .unwrap();
        assert_eq!(spec, AudienceSpec::All);

        let mut r = req(AudienceType::Inactive);
        r.inactive_days = Some(0);
        assert_eq!(
            r.into_spec(MissingParameterPolicy::Broaden).unwrap(),
            AudienceSpec::All
        );
    }

    #[test]
    fn missing_parameter_rejected_under_reject_policy() {
        let err = req(AudienceType::Category)
            .into_spec(MissingParameterPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
        assert!(err.to_string().contains("category_id"));
    }

    #[test]
    fn oversized_inactive_window_is_rejected() {
        let mut r = req(AudienceType::Inactive);
        r.inactive_days = Some(1_000_000_000);
        let err = r.into_spec(MissingParameterPolicy::Broaden).unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
        assert!(err.to_string().contains("inactive_days"));

        let mut r = req(AudienceType::Inactive);
        r.inactive_days = Some(MAX_WINDOW_DAYS);
        assert_eq!(
            r.into_spec(MissingParameterPolicy::Reject).unwrap(),
            AudienceSpec::Inactive {
                inactive_days: MAX_WINDOW_DAYS
            }
        );
    }

    #[test]
    fn missing_type_means_all() {
        let spec = AudienceRequest::default()
            .into_spec(MissingParameterPolicy::Reject)
            .unwrap();
        assert_eq!(spec, AudienceSpec::All);
    }

    #[test]
    fn spec_serializes_as_tagged_union() {
        let json = serde_json::to_value(AudienceSpec::Inactive { inactive_days: 30 }).unwrap();
        assert_eq!(json["type"], "inactive");
        assert_eq!(json["inactive_days"], 30);
    }
}
