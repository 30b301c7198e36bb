//! Which requests an actor may list. Broader than what they may act on, so a
//! request can be tracked before it is the actor's turn.
use super::jurisdiction::{Actor, Role};
use super::request::{InitiationKind, TransferRequest, TransferStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Listing {
    /// Everything in the actor's jurisdiction.
    #[default]
    Tracking,
    /// The receiving WardAdmin's queue: hidden until the WEO stage has passed.
    Queue,
}

pub fn is_visible(actor: &Actor, request: &TransferRequest, listing: Listing) -> bool {
    match actor.role() {
        Role::SuperAdmin => true,
        Role::WardExecutiveOfficer => actor
            .ward_id()
            .is_some_and(|ward| ward == request.from_ward_id || ward == request.to_ward_id),
        Role::WardAdmin => {
            let queued = request.status.has_reached(TransferStatus::WeoApproved);
            actor.ward_id() == Some(request.to_ward_id) && (listing == Listing::Tracking || queued)
        }
        Role::VillageExecutiveOfficer => {
            actor.village_id() == Some(request.to_village_id) && veo_gate_passed(request)
        }
    }
}

// a VEO sees in-flight requests only once the stages before theirs are done,
// and never sees an in-flight SuperAdmin-driven transfer
fn veo_gate_passed(request: &TransferRequest) -> bool {
    let gate = match request.initiation_kind {
        InitiationKind::VeoInitiated => TransferStatus::WeoApproved,
        InitiationKind::WardAdminInitiated => TransferStatus::WardApproved,
        InitiationKind::SuperAdminInitiated => return request.is_terminal(),
    };
    request.status.has_reached(gate)
}

pub fn filter_visible<'a, I>(actor: &Actor, requests: I, listing: Listing) -> Vec<TransferRequest>
where
    I: IntoIterator<Item = &'a TransferRequest>,
{
    requests
        .into_iter()
        .filter(|request| is_visible(actor, request, listing))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction::{VillageId, WardId};
    use crate::request::TimeStamp;
    use crate::residence::{Residence, ResidenceId};

    fn request(kind: InitiationKind, status: TransferStatus) -> TransferRequest {
        let residence = Residence::new(ResidenceId(3), "Halima Juma", WardId(5), VillageId(50));
        let mut request = TransferRequest::new(
            "transfer_vis".into(),
            &residence,
            WardId(9),
            VillageId(90),
            kind,
            &Actor::super_admin("user_root"),
            TimeStamp::new(),
        )
        .unwrap();
        request.status = status;
        request
    }

    #[test]
    fn weo_sees_both_sides() {
        let req = request(InitiationKind::VeoInitiated, TransferStatus::PendingApproval);

        assert!(is_visible(&Actor::weo("user_w5", WardId(5)), &req, Listing::Tracking));
        assert!(is_visible(&Actor::weo("user_w9", WardId(9)), &req, Listing::Tracking));
        assert!(!is_visible(&Actor::weo("user_w1", WardId(1)), &req, Listing::Tracking));
    }

    #[test]
    fn ward_admin_queue_waits_for_weo_stage() {
        let admin = Actor::ward_admin("user_a9", WardId(9));

        let pending = request(InitiationKind::WardAdminInitiated, TransferStatus::PendingApproval);
        assert!(is_visible(&admin, &pending, Listing::Tracking));
        assert!(!is_visible(&admin, &pending, Listing::Queue));

        let approved = request(InitiationKind::WardAdminInitiated, TransferStatus::WeoApproved);
        assert!(is_visible(&admin, &approved, Listing::Queue));

        let rejected = request(InitiationKind::WardAdminInitiated, TransferStatus::Rejected);
        assert!(is_visible(&admin, &rejected, Listing::Queue));

        let sending_admin = Actor::ward_admin("user_a5", WardId(5));
        assert!(!is_visible(&sending_admin, &approved, Listing::Tracking));
    }

    #[test]
    fn veo_gate_depends_on_initiation_kind() {
        let veo = Actor::veo("user_v90", WardId(9), VillageId(90));
        let cases = [
            (InitiationKind::VeoInitiated, TransferStatus::PendingApproval, false),
            (InitiationKind::VeoInitiated, TransferStatus::WeoApproved, true),
            (InitiationKind::WardAdminInitiated, TransferStatus::WeoApproved, false),
            (InitiationKind::WardAdminInitiated, TransferStatus::WardApproved, true),
            (InitiationKind::SuperAdminInitiated, TransferStatus::WardApproved, false),
            (InitiationKind::SuperAdminInitiated, TransferStatus::Completed, true),
            (InitiationKind::SuperAdminInitiated, TransferStatus::Rejected, true),
        ];

        for (kind, status, visible) in cases {
            assert_eq!(
                is_visible(&veo, &request(kind, status), Listing::Tracking),
                visible,
                "{kind} at {status}"
            );
        }
    }
}
