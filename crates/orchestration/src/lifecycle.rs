//! Campaign lifecycle state machine.
//!
//! Guards every status change a campaign can go through. Callers apply the
//! returned status under the campaign row lock so the check and the write
//! happen together.

use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::CampaignStatus;
use serde::{Deserialize, Serialize};

/// An action that may move a campaign between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignAction {
    /// Draft | Scheduled -> Scheduled (future time set)
    Schedule,
    /// Scheduled | Draft -> Draft (schedule cleared)
    Unschedule,
    /// Draft | Scheduled -> Sending
    Launch,
    /// Sending -> Paused
    Pause,
    /// Paused -> Sending
    Resume,
    /// Draft | Scheduled -> same state
    Edit,
    /// Any non-terminal -> Cancelled
    Cancel,
    /// Sending -> Completed, driven by worker status reports
    Complete,
}

impl CampaignAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignAction::Schedule => "schedule",
            CampaignAction::Unschedule => "unschedule",
            CampaignAction::Launch => "launch",
            CampaignAction::Pause => "pause",
            CampaignAction::Resume => "resume",
            CampaignAction::Edit => "edit",
            CampaignAction::Cancel => "cancel",
            CampaignAction::Complete => "complete",
        }
    }
}

pub struct CampaignStateMachine;

impl CampaignStateMachine {
    /// Validate that `action` is allowed from `current` and return the
    /// target status, or the reason it is refused.
    pub fn next_status(
        current: CampaignStatus,
        action: CampaignAction,
    ) -> CampaignResult<CampaignStatus> {
        use self::CampaignAction as A;
        use campaign_core::types::CampaignStatus as S;

        match (current, action) {
            (S::Draft | S::Scheduled, A::Schedule) => Ok(S::Scheduled),
            (S::Draft | S::Scheduled, A::Unschedule) => Ok(S::Draft),
            (S::Draft | S::Scheduled, A::Launch) => Ok(S::Sending),
            (S::Sending, A::Pause) => Ok(S::Paused),
            (S::Paused, A::Resume) => Ok(S::Sending),
            (S::Draft | S::Scheduled, A::Edit) => Ok(current),
            (S::Sending, A::Complete) => Ok(S::Completed),
            (s, A::Cancel) if !s.is_terminal() => Ok(S::Cancelled),
            (_, action) => Err(CampaignError::precondition(Self::refusal(action))),
        }
    }

    pub fn can(current: CampaignStatus, action: CampaignAction) -> bool {
        Self::next_status(current, action).is_ok()
    }

    /// Deleting is not a transition but is guarded the same way.
    pub fn ensure_deletable(current: CampaignStatus) -> CampaignResult<()> {
        if current == CampaignStatus::Sending {
            Err(CampaignError::precondition(
                "Cannot delete a campaign while it is sending; pause or cancel it first",
            ))
        } else {
            Ok(())
        }
    }

    fn refusal(action: CampaignAction) -> &'static str {
        match action {
            CampaignAction::Schedule | CampaignAction::Unschedule | CampaignAction::Edit => {
                "Only draft or scheduled campaigns can be edited"
            }
            CampaignAction::Launch => "Can only launch a draft or scheduled campaign",
            CampaignAction::Pause => "Can only pause a sending campaign",
            CampaignAction::Resume => "Can only resume a paused campaign",
            CampaignAction::Cancel => "Campaign is already completed or cancelled",
            CampaignAction::Complete => "Only a sending campaign can complete",
        }
    }
}
