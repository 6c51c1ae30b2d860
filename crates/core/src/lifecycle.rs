//! Campaign and message state machines.
//!
//! The transition tables live here as pure functions; the store applies the
//! winning transition with a conditional update so duplicate queue deliveries
//! and concurrent requests collapse to a single state change.

use crate::types::{AssetStatus, CampaignStatus, CampaignType, MessageStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },
    #[error("campaign has no targeted audience")]
    EmptyAudience,
    #[error("campaign is {0} and cannot be modified")]
    Immutable(CampaignStatus),
    #[error("rejection requires a non-empty reason")]
    MissingReason,
}

impl CampaignStatus {
    /// The campaign lifecycle graph. `Rejected -> Draft` (resubmission) is
    /// the only backward edge; the batcher's rollback to `AssetGenerated`
    /// is applied through a dedicated store operation, not this table.
    pub fn can_transition(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, to),
            (Draft, PendingApproval)
                | (Rejected, PendingApproval)
                | (Rejected, Draft)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, AssetGeneration)
                | (AssetGeneration, AssetGenerated)
                | (AssetGenerated, ReadyToLaunch)
                | (ReadyToLaunch, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Cancelled)
                | (Paused, Running)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }
}

pub fn check_transition(from: CampaignStatus, to: CampaignStatus) -> Result<(), StateError> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition { from, to })
    }
}

/// `draft|rejected -> pending_approval` requires at least one targeted
/// audience row.
pub fn check_submit(from: CampaignStatus, total_targeted_audience: i32) -> Result<(), StateError> {
    check_transition(from, CampaignStatus::PendingApproval)?;
    if total_targeted_audience <= 0 {
        return Err(StateError::EmptyAudience);
    }
    Ok(())
}

pub fn check_reject_reason(reason: &str) -> Result<(), StateError> {
    if reason.trim().is_empty() {
        Err(StateError::MissingReason)
    } else {
        Ok(())
    }
}

/// Campaign fields are frozen once the campaign is running or terminal.
pub fn check_update(status: CampaignStatus) -> Result<(), StateError> {
    match status {
        CampaignStatus::Running | CampaignStatus::Completed | CampaignStatus::Cancelled => {
            Err(StateError::Immutable(status))
        }
        _ => Ok(()),
    }
}

/// Delete additionally rejects scheduled campaigns awaiting launch.
pub fn check_delete(status: CampaignStatus, campaign_type: CampaignType) -> Result<(), StateError> {
    check_update(status)?;
    if campaign_type == CampaignType::Scheduled && status == CampaignStatus::ReadyToLaunch {
        return Err(StateError::Immutable(status));
    }
    Ok(())
}

pub fn check_add_audience(status: CampaignStatus) -> Result<(), StateError> {
    match status {
        CampaignStatus::Running | CampaignStatus::Completed | CampaignStatus::Cancelled => {
            Err(StateError::Immutable(status))
        }
        _ => Ok(()),
    }
}

pub fn check_remove_audience(status: CampaignStatus) -> Result<(), StateError> {
    match status {
        CampaignStatus::Running | CampaignStatus::Completed => Err(StateError::Immutable(status)),
        _ => Ok(()),
    }
}

impl MessageStatus {
    fn rung(self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::AssetGenerating => 1,
            MessageStatus::AssetGenerated => 2,
            MessageStatus::ReadyToSend => 3,
            MessageStatus::Sent => 4,
            MessageStatus::Delivered => 5,
            MessageStatus::Read => 6,
            MessageStatus::Failed => 7,
        }
    }

    /// The delivery ladder moves strictly forward; `Failed` is reachable from
    /// any non-terminal rung. Delivery callbacks may arrive out of order from
    /// the at-least-once queue, so a stale earlier status is simply rejected.
    pub fn can_advance_to(self, to: MessageStatus) -> bool {
        if self == MessageStatus::Read || self == MessageStatus::Failed {
            return false;
        }
        if to == MessageStatus::Failed {
            return true;
        }
        to.rung() > self.rung()
    }
}

/// A recipient may only reach `ready_to_send` once its asset sub-state is
/// `generated`, unless the template needs no generated asset.
pub fn ready_gate(asset_required: bool, asset_status: AssetStatus) -> bool {
    !asset_required || asset_status == AssetStatus::Generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Draft,
            PendingApproval,
            Approved,
            AssetGeneration,
            AssetGenerated,
            ReadyToLaunch,
            Running,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_rejection_and_resubmission() {
        assert!(PendingApproval.can_transition(Rejected));
        assert!(Rejected.can_transition(Draft));
        assert!(Rejected.can_transition(PendingApproval));
    }

    #[test]
    fn test_pause_and_resume() {
        assert!(Running.can_transition(Paused));
        assert!(Paused.can_transition(Running));
        assert!(!Paused.can_transition(Completed));
    }

    #[test]
    fn test_terminal_states_are_dead_ends() {
        for to in [Draft, PendingApproval, Running, Paused] {
            assert!(!Completed.can_transition(to));
            assert!(!Cancelled.can_transition(to));
        }
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!Draft.can_transition(Approved));
        assert!(!Approved.can_transition(Running));
        assert!(!AssetGenerated.can_transition(Running));
    }

    #[test]
    fn test_submit_requires_audience() {
        assert_eq!(check_submit(Draft, 0), Err(StateError::EmptyAudience));
        assert_eq!(check_submit(Draft, 1), Ok(()));
        assert!(matches!(
            check_submit(Running, 5),
            Err(StateError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_update_frozen_once_running() {
        assert!(check_update(Draft).is_ok());
        assert!(check_update(Paused).is_ok());
        assert_eq!(check_update(Running), Err(StateError::Immutable(Running)));
        assert_eq!(
            check_update(Completed),
            Err(StateError::Immutable(Completed))
        );
    }

    #[test]
    fn test_delete_rejects_scheduled_awaiting_launch() {
        assert!(check_delete(Draft, CampaignType::Scheduled).is_ok());
        assert!(check_delete(ReadyToLaunch, CampaignType::Immediate).is_ok());
        assert_eq!(
            check_delete(ReadyToLaunch, CampaignType::Scheduled),
            Err(StateError::Immutable(ReadyToLaunch))
        );
    }

    #[test]
    fn test_audience_mutation_guards() {
        assert!(check_add_audience(Draft).is_ok());
        assert!(check_add_audience(Paused).is_ok());
        // Mid-generation adds are allowed; the asset pipeline sweeps the new
        // rows into the running phase on its next pass.
        assert!(check_add_audience(AssetGeneration).is_ok());
        assert!(check_add_audience(Running).is_err());
        assert!(check_add_audience(Cancelled).is_err());

        assert!(check_remove_audience(Cancelled).is_ok());
        assert!(check_remove_audience(Running).is_err());
        assert!(check_remove_audience(Completed).is_err());
    }

    #[test]
    fn test_reject_requires_reason() {
        assert_eq!(check_reject_reason("  "), Err(StateError::MissingReason));
        assert!(check_reject_reason("missing brand approval").is_ok());
    }

    #[test]
    fn test_message_ladder_forward_only() {
        use MessageStatus::*;
        assert!(Pending.can_advance_to(ReadyToSend));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Delivered.can_advance_to(Read));
        assert!(!Delivered.can_advance_to(Sent));
        assert!(!Read.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Pending));
        assert!(Pending.can_advance_to(Failed));
        assert!(Sent.can_advance_to(Failed));
    }

    #[test]
    fn test_failed_rung_accepts_nothing_until_reopened() {
        use MessageStatus::*;
        // No delivery callback can land on a failed recipient.
        assert!(!Failed.can_advance_to(Sent));
        assert!(!Failed.can_advance_to(Delivered));
        assert!(!Failed.can_advance_to(Read));
        assert!(!Failed.can_advance_to(Failed));
        // A requeued delivery resets the recipient to ready_to_send, from
        // where every provider outcome applies again.
        assert!(ReadyToSend.can_advance_to(Sent));
        assert!(ReadyToSend.can_advance_to(Delivered));
        assert!(ReadyToSend.can_advance_to(Failed));
    }

    #[test]
    fn test_ready_gate() {
        assert!(ready_gate(false, AssetStatus::Pending));
        assert!(ready_gate(true, AssetStatus::Generated));
        assert!(!ready_gate(true, AssetStatus::Processing));
        assert!(!ready_gate(true, AssetStatus::Failed));
    }
}
