//! Authorization predicate: may this actor act on this request at all, and which
//! actions apply at its current status.
use super::engine;
use super::error::TransferError;
use super::jurisdiction::{Actor, Role};
use super::request::TransferRequest;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Approve,
    Reject,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Approve, Action::Reject, Action::Cancel];

    pub fn requires_reason(&self) -> bool {
        matches!(self, Action::Reject | Action::Cancel)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::Cancel => "cancel",
        })
    }
}

/// Jurisdiction check shared by approve and reject.
///
/// A WEO oversees both sides of a transfer touching their ward. A WardAdmin and a
/// VEO only act on the receiving side.
pub fn can_act(actor: &Actor, request: &TransferRequest) -> bool {
    match actor.role() {
        Role::SuperAdmin => true,
        Role::WardExecutiveOfficer => actor
            .ward_id()
            .is_some_and(|ward| ward == request.from_ward_id || ward == request.to_ward_id),
        Role::WardAdmin => actor.ward_id() == Some(request.to_ward_id),
        Role::VillageExecutiveOfficer => actor.village_id() == Some(request.to_village_id),
    }
}

pub fn may_cancel(actor: &Actor) -> bool {
    matches!(actor.role(), Role::WardAdmin | Role::SuperAdmin)
}

/// Gate an action before the engine computes anything.
pub fn authorize(
    actor: &Actor,
    request: &TransferRequest,
    action: Action,
) -> Result<(), TransferError> {
    if request.is_terminal() {
        return Err(invalid_transition(actor, request, action));
    }

    match action {
        // jurisdiction is not consulted for cancellation
        Action::Cancel if may_cancel(actor) => Ok(()),
        Action::Cancel => Err(permission_denied(actor, request, action)),
        Action::Approve | Action::Reject => {
            if !can_act(actor, request) {
                return Err(permission_denied(actor, request, action));
            }
            // rejecting is open to whoever could approve at this status
            if engine::approval_step(request.status, actor.role()).is_none() {
                return Err(invalid_transition(actor, request, action));
            }
            Ok(())
        }
    }
}

pub fn applicable_actions(actor: &Actor, request: &TransferRequest) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| authorize(actor, request, *action).is_ok())
        .collect()
}

pub(crate) fn permission_denied(
    actor: &Actor,
    request: &TransferRequest,
    action: Action,
) -> TransferError {
    TransferError::PermissionDenied {
        request_id: request.id.clone(),
        role: actor.role(),
        action,
        status: request.status,
    }
}

pub(crate) fn invalid_transition(
    actor: &Actor,
    request: &TransferRequest,
    action: Action,
) -> TransferError {
    TransferError::InvalidTransition {
        request_id: request.id.clone(),
        role: actor.role(),
        action,
        status: request.status,
    }
}

pub(crate) fn missing_reason(
    actor: &Actor,
    request: &TransferRequest,
    action: Action,
) -> TransferError {
    TransferError::MissingReason {
        request_id: request.id.clone(),
        role: actor.role(),
        action,
        status: request.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction::{VillageId, WardId};
    use crate::request::{InitiationKind, TimeStamp, TransferStatus};
    use crate::residence::{Residence, ResidenceId};

    fn request(from: (u64, u64), to: (u64, u64), status: TransferStatus) -> TransferRequest {
        let residence =
            Residence::new(ResidenceId(1), "Juma Ali", WardId(from.0), VillageId(from.1));
        let mut request = TransferRequest::new(
            "transfer_test".into(),
            &residence,
            WardId(to.0),
            VillageId(to.1),
            InitiationKind::SuperAdminInitiated,
            &Actor::super_admin("user_root"),
            TimeStamp::new(),
        )
        .unwrap();
        request.status = status;
        request
    }

    #[test]
    fn weo_acts_on_either_side_of_their_ward() {
        let req = request((5, 50), (9, 90), TransferStatus::PendingApproval);

        assert!(can_act(&Actor::weo("user_w5", WardId(5)), &req));
        assert!(can_act(&Actor::weo("user_w9", WardId(9)), &req));
        assert!(!can_act(&Actor::weo("user_w3", WardId(3)), &req));
    }

    #[test]
    fn ward_admin_and_veo_only_act_on_receiving_side() {
        let req = request((5, 50), (9, 90), TransferStatus::PendingApproval);

        assert!(can_act(&Actor::ward_admin("user_a9", WardId(9)), &req));
        assert!(!can_act(&Actor::ward_admin("user_a5", WardId(5)), &req));
        assert!(can_act(&Actor::veo("user_v90", WardId(9), VillageId(90)), &req));
        assert!(!can_act(&Actor::veo("user_v50", WardId(5), VillageId(50)), &req));
    }

    #[test]
    fn cancel_ignores_jurisdiction_but_not_role() {
        let req = request((5, 50), (9, 90), TransferStatus::WardApproved);

        assert!(authorize(&Actor::ward_admin("user_a1", WardId(1)), &req, Action::Cancel).is_ok());
        assert!(matches!(
            authorize(&Actor::weo("user_w9", WardId(9)), &req, Action::Cancel),
            Err(TransferError::PermissionDenied { .. })
        ));
        assert!(matches!(
            authorize(&Actor::veo("user_v90", WardId(9), VillageId(90)), &req, Action::Cancel),
            Err(TransferError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn applicable_actions_follow_status() {
        let weo = Actor::weo("user_w9", WardId(9));

        let pending = request((5, 50), (9, 90), TransferStatus::PendingApproval);
        assert_eq!(applicable_actions(&weo, &pending), vec![Action::Approve, Action::Reject]);

        let ward_approved = request((5, 50), (9, 90), TransferStatus::WardApproved);
        assert!(applicable_actions(&weo, &ward_approved).is_empty());

        let admin = Actor::ward_admin("user_a9", WardId(9));
        assert_eq!(applicable_actions(&admin, &ward_approved), vec![Action::Cancel]);

        let completed = request((5, 50), (9, 90), TransferStatus::Completed);
        assert!(applicable_actions(&Actor::super_admin("user_root"), &completed).is_empty());
    }
}
