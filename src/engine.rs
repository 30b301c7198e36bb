//! Transition engine for the relocation approval chain.
//!
//! The approve table is keyed by `(status, role)` and is the only place that
//! decides what an approval does. Whether the actor may invoke it at all is the
//! business of [`crate::policy`].
use super::error::TransferError;
use super::jurisdiction::{Actor, Role};
use super::policy::{self, Action};
use super::request::{TimeStamp, TransferRequest, TransferStatus, WitnessType};
use chrono::Utc;

pub const DEFAULT_CANCELLATION_MARKER: &str = "[cancelled by administrator] ";

/// Which approver pair an approval writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Weo,
    Ward,
    Veo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalStep {
    pub next: TransferStatus,
    pub stamp: Stage,
    pub relocates: bool,
}

/// The approve table. SuperAdmin and VEO shortcuts jump straight through
/// `veo_accepted` into `completed`.
pub fn approval_step(status: TransferStatus, role: Role) -> Option<ApprovalStep> {
    use Role::*;
    use TransferStatus::*;

    let step = |next: TransferStatus, stamp: Stage| {
        Some(ApprovalStep {
            next,
            stamp,
            relocates: next == Completed,
        })
    };

    match (status, role) {
        (PendingApproval, SuperAdmin) => step(WeoApproved, Stage::Weo),
        (WeoApproved, SuperAdmin) => step(Completed, Stage::Veo),
        (PendingApproval, VillageExecutiveOfficer) => step(Completed, Stage::Veo),
        (PendingApproval, WardExecutiveOfficer) => step(WeoApproved, Stage::Weo),
        (PendingApproval, WardAdmin) => step(WeoApproved, Stage::Weo),
        (WeoApproved, WardExecutiveOfficer) => step(WardApproved, Stage::Ward),
        (WardApproved, VillageExecutiveOfficer) => step(Completed, Stage::Veo),
        _ => None,
    }
}

/// A computed but not yet committed transition.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Status the request must still have at commit time.
    pub expected: TransferStatus,
    /// Role of the actor the transition was computed for.
    pub role: Role,
    pub updated: TransferRequest,
    /// Write the destination onto the residence in the same unit of work.
    pub relocates: bool,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.updated.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct TransitionEngine {
    cancellation_marker: String,
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CANCELLATION_MARKER)
    }
}

impl TransitionEngine {
    pub fn new(cancellation_marker: &str) -> Self {
        Self {
            cancellation_marker: cancellation_marker.to_string(),
        }
    }

    pub fn cancellation_marker(&self) -> &str {
        &self.cancellation_marker
    }

    /// Compute the next state of `request` for `action` by `actor`.
    ///
    /// Checks run in a fixed order: terminal status, missing reason,
    /// authorization, then the approve table.
    pub fn plan(
        &self,
        request: &TransferRequest,
        actor: &Actor,
        action: Action,
        reason: Option<&str>,
        now: TimeStamp<Utc>,
    ) -> Result<Transition, TransferError> {
        if request.is_terminal() {
            return Err(policy::invalid_transition(actor, request, action));
        }

        let reason = reason.map(str::trim).unwrap_or_default();
        if action.requires_reason() && reason.is_empty() {
            return Err(policy::missing_reason(actor, request, action));
        }

        policy::authorize(actor, request, action)?;

        let mut updated = request.clone();
        let mut relocates = false;

        match action {
            Action::Approve => {
                let step = approval_step(request.status, actor.role())
                    .ok_or_else(|| policy::invalid_transition(actor, request, action))?;

                let (by, at) = match step.stamp {
                    Stage::Weo => (&mut updated.weo_approved_by, &mut updated.weo_approved_at),
                    Stage::Ward => (&mut updated.ward_approved_by, &mut updated.ward_approved_at),
                    Stage::Veo => (&mut updated.veo_accepted_by, &mut updated.veo_accepted_at),
                };
                // stamps are write-once
                if by.is_some() {
                    return Err(policy::invalid_transition(actor, request, action));
                }
                *by = Some(actor.id().to_string());
                *at = Some(now.clone());

                updated.status = step.next;
                relocates = step.relocates;
                updated.push_witness(
                    actor,
                    now,
                    WitnessType::Approve {
                        from: request.status,
                        to: step.next,
                    },
                )?;
            }
            Action::Reject => {
                self.close(&mut updated, actor, now.clone(), reason.to_string());
                updated.push_witness(
                    actor,
                    now,
                    WitnessType::Reject {
                        reason: reason.to_string(),
                    },
                )?;
            }
            Action::Cancel => {
                let marked = format!("{}{}", self.cancellation_marker, reason);
                self.close(&mut updated, actor, now.clone(), marked);
                updated.push_witness(
                    actor,
                    now,
                    WitnessType::Cancel {
                        reason: reason.to_string(),
                    },
                )?;
            }
        }

        debug_assert!(request.status.can_advance_to(updated.status));

        Ok(Transition {
            expected: request.status,
            role: actor.role(),
            updated,
            relocates,
        })
    }

    fn close(
        &self,
        request: &mut TransferRequest,
        actor: &Actor,
        now: TimeStamp<Utc>,
        reason: String,
    ) {
        request.status = TransferStatus::Rejected;
        request.rejected_by = Some(actor.id().to_string());
        request.rejected_at = Some(now);
        request.rejection_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction::{VillageId, WardId};
    use crate::request::InitiationKind;
    use crate::residence::{Residence, ResidenceId};

    fn pending(kind: InitiationKind) -> TransferRequest {
        let residence = Residence::new(ResidenceId(7), "Neema Mushi", WardId(5), VillageId(50));
        TransferRequest::new(
            "transfer_engine".into(),
            &residence,
            WardId(7),
            VillageId(42),
            kind,
            &Actor::super_admin("user_root"),
            TimeStamp::new(),
        )
        .unwrap()
    }

    #[test]
    fn table_covers_only_listed_pairs() {
        let listed = [
            (TransferStatus::PendingApproval, Role::WardExecutiveOfficer),
            (TransferStatus::PendingApproval, Role::WardAdmin),
            (TransferStatus::PendingApproval, Role::VillageExecutiveOfficer),
            (TransferStatus::PendingApproval, Role::SuperAdmin),
            (TransferStatus::WeoApproved, Role::WardExecutiveOfficer),
            (TransferStatus::WeoApproved, Role::SuperAdmin),
            (TransferStatus::WardApproved, Role::VillageExecutiveOfficer),
        ];
        let roles = [
            Role::SuperAdmin,
            Role::WardAdmin,
            Role::WardExecutiveOfficer,
            Role::VillageExecutiveOfficer,
        ];

        for status in TransferStatus::ALL {
            for role in roles {
                let expected = listed.contains(&(status, role));
                assert_eq!(approval_step(status, role).is_some(), expected, "{status} / {role}");
            }
        }
    }

    #[test]
    fn shortcuts_relocate() {
        assert!(approval_step(TransferStatus::WeoApproved, Role::SuperAdmin).unwrap().relocates);
        assert!(
            approval_step(TransferStatus::PendingApproval, Role::VillageExecutiveOfficer)
                .unwrap()
                .relocates
        );
        assert!(
            !approval_step(TransferStatus::PendingApproval, Role::SuperAdmin)
                .unwrap()
                .relocates
        );
    }

    #[test]
    fn ward_admin_stamps_weo_stage() {
        let engine = TransitionEngine::default();
        let request = pending(InitiationKind::WardAdminInitiated);
        let admin = Actor::ward_admin("user_admin7", WardId(7));

        let transition = engine
            .plan(&request, &admin, Action::Approve, None, TimeStamp::new())
            .unwrap();

        assert_eq!(transition.expected, TransferStatus::PendingApproval);
        assert_eq!(transition.updated.status, TransferStatus::WeoApproved);
        assert_eq!(transition.updated.weo_approved_by.as_deref(), Some("user_admin7"));
        assert!(!transition.relocates);
        assert!(transition.updated.verify_history());
    }

    #[test]
    fn blank_reason_is_missing() {
        let engine = TransitionEngine::default();
        let request = pending(InitiationKind::VeoInitiated);
        let root = Actor::super_admin("user_root");

        for reason in [None, Some(""), Some("   ")] {
            assert!(matches!(
                engine.plan(&request, &root, Action::Reject, reason, TimeStamp::new()),
                Err(TransferError::MissingReason {
                    action: Action::Reject,
                    role: Role::SuperAdmin,
                    status: TransferStatus::PendingApproval,
                    ..
                })
            ));
        }
    }

    #[test]
    fn cancel_marks_reason() {
        let engine = TransitionEngine::new("CANCELLED: ");
        let request = pending(InitiationKind::VeoInitiated);
        let admin = Actor::ward_admin("user_admin2", WardId(2));

        let transition = engine
            .plan(&request, &admin, Action::Cancel, Some(" duplicate entry "), TimeStamp::new())
            .unwrap();

        assert_eq!(transition.updated.status, TransferStatus::Rejected);
        assert_eq!(
            transition.updated.rejection_reason.as_deref(),
            Some("CANCELLED: duplicate entry")
        );
        assert!(transition.is_terminal());
    }

    #[test]
    fn terminal_request_refuses_everything() {
        let engine = TransitionEngine::default();
        let mut request = pending(InitiationKind::SuperAdminInitiated);
        request.status = TransferStatus::Completed;
        let root = Actor::super_admin("user_root");

        for action in Action::ALL {
            assert!(matches!(
                engine.plan(&request, &root, action, Some("late"), TimeStamp::new()),
                Err(TransferError::InvalidTransition { .. })
            ));
        }
    }
}
