//! Transfer request record, its status graph and the witnessed approval history
use super::error::{TransferError, ValidationError};
use super::jurisdiction::{Actor, Role, VillageId, WardId};
use super::residence::{Residence, ResidenceId};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Which role's action created the request. Fixed for the life of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum InitiationKind {
    #[n(0)]
    VeoInitiated,
    #[n(1)]
    WardAdminInitiated,
    #[n(2)]
    SuperAdminInitiated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum TransferStatus {
    #[n(0)]
    PendingApproval,
    #[n(1)]
    WeoApproved,
    #[n(2)]
    WardApproved,
    #[n(3)]
    VeoAccepted,
    #[n(4)]
    Completed,
    #[n(5)]
    Rejected,
}

impl InitiationKind {
    /// The kind a requester of the given role submits under. WEOs do not initiate.
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::VillageExecutiveOfficer => Some(InitiationKind::VeoInitiated),
            Role::WardAdmin => Some(InitiationKind::WardAdminInitiated),
            Role::SuperAdmin => Some(InitiationKind::SuperAdminInitiated),
            Role::WardExecutiveOfficer => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiationKind::VeoInitiated => "veo_initiated",
            InitiationKind::WardAdminInitiated => "ward_admin_initiated",
            InitiationKind::SuperAdminInitiated => "super_admin_initiated",
        }
    }
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 6] = [
        TransferStatus::PendingApproval,
        TransferStatus::WeoApproved,
        TransferStatus::WardApproved,
        TransferStatus::VeoAccepted,
        TransferStatus::Completed,
        TransferStatus::Rejected,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Rejected)
    }
    // position along the approval chain; both terminals share the last slot
    fn stage(&self) -> u8 {
        match self {
            TransferStatus::PendingApproval => 0,
            TransferStatus::WeoApproved => 1,
            TransferStatus::WardApproved => 2,
            TransferStatus::VeoAccepted => 3,
            TransferStatus::Completed | TransferStatus::Rejected => 4,
        }
    }
    /// True once the request has reached `gate` or any later stage. Terminal
    /// statuses have reached every gate.
    pub fn has_reached(&self, gate: TransferStatus) -> bool {
        self.is_terminal() || self.stage() >= gate.stage()
    }
    /// Whether `next` is a legal successor: strictly forward along the chain, or
    /// sideways into `rejected` from any non-terminal status.
    pub fn can_advance_to(&self, next: TransferStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TransferStatus::Rejected => true,
            TransferStatus::PendingApproval => false,
            _ => next.stage() > self.stage(),
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::PendingApproval => "pending_approval",
            TransferStatus::WeoApproved => "weo_approved",
            TransferStatus::WardApproved => "ward_approved",
            TransferStatus::VeoAccepted => "veo_accepted",
            TransferStatus::Completed => "completed",
            TransferStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InitiationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a request's approval history.
#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Witness {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub actor_id: String,
    #[n(2)]
    pub role: Role,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub witness_type: WitnessType,
    #[n(5)]
    pub prev_hash: Option<String>, // sha256 of the previous witness, None for the first
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum WitnessType {
    #[n(0)]
    Submit {
        #[n(0)]
        initiation_kind: InitiationKind,
    },
    #[n(1)]
    Approve {
        #[n(0)]
        from: TransferStatus,
        #[n(1)]
        to: TransferStatus,
    },
    #[n(2)]
    Reject {
        #[n(0)]
        reason: String,
    },
    #[n(3)]
    Cancel {
        #[n(0)]
        reason: String,
    },
}

impl Witness {
    pub fn digest(&self) -> Result<String, TransferError> {
        let cbor = minicbor::to_vec(self)?;
        Ok(sha256::digest(&cbor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct TransferRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub residence_id: ResidenceId,
    #[n(2)]
    pub from_ward_id: WardId,
    #[n(3)]
    pub from_village_id: VillageId,
    #[n(4)]
    pub to_ward_id: WardId,
    #[n(5)]
    pub to_village_id: VillageId,
    #[n(6)]
    pub initiation_kind: InitiationKind,
    #[n(7)]
    pub status: TransferStatus,
    #[n(8)]
    pub requested_by: String,
    #[n(9)]
    pub requested_at: TimeStamp<Utc>,
    #[n(10)]
    pub weo_approved_by: Option<String>,
    #[n(11)]
    pub weo_approved_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub ward_approved_by: Option<String>,
    #[n(13)]
    pub ward_approved_at: Option<TimeStamp<Utc>>,
    #[n(14)]
    pub veo_accepted_by: Option<String>,
    #[n(15)]
    pub veo_accepted_at: Option<TimeStamp<Utc>>,
    #[n(16)]
    pub rejected_by: Option<String>,
    #[n(17)]
    pub rejected_at: Option<TimeStamp<Utc>>,
    #[n(18)]
    pub rejection_reason: Option<String>,
    #[n(19)]
    pub history: Vec<Witness>,
}

impl TransferRequest {
    /// Open a new request in `pending_approval`, taking the origin from the
    /// residence's current jurisdiction.
    pub fn new(
        id: String,
        residence: &Residence,
        to_ward_id: WardId,
        to_village_id: VillageId,
        initiation_kind: InitiationKind,
        requester: &Actor,
        requested_at: TimeStamp<Utc>,
    ) -> Result<Self, TransferError> {
        if residence.ward_id == to_ward_id && residence.village_id == to_village_id {
            return Err(ValidationError::NoOpTransfer {
                ward: to_ward_id,
                village: to_village_id,
            }
            .into());
        }

        let mut request = Self {
            id,
            residence_id: residence.id,
            from_ward_id: residence.ward_id,
            from_village_id: residence.village_id,
            to_ward_id,
            to_village_id,
            initiation_kind,
            status: TransferStatus::PendingApproval,
            requested_by: requester.id().to_string(),
            requested_at: requested_at.clone(),
            weo_approved_by: None,
            weo_approved_at: None,
            ward_approved_by: None,
            ward_approved_at: None,
            veo_accepted_by: None,
            veo_accepted_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            history: vec![],
        };
        request.push_witness(requester, requested_at, WitnessType::Submit { initiation_kind })?;

        Ok(request)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a witness, chaining it to the hash of the previous one.
    pub fn push_witness(
        &mut self,
        actor: &Actor,
        timestamp: TimeStamp<Utc>,
        witness_type: WitnessType,
    ) -> Result<(), TransferError> {
        let prev_hash = match self.history.last() {
            Some(prev) => Some(prev.digest()?),
            None => None,
        };
        self.history.push(Witness {
            request_id: self.id.clone(),
            actor_id: actor.id().to_string(),
            role: actor.role(),
            timestamp,
            witness_type,
            prev_hash,
        });
        Ok(())
    }

    /// Walk the history and check every link points at its predecessor.
    pub fn verify_history(&self) -> bool {
        let mut expected: Option<String> = None;
        for witness in &self.history {
            if witness.request_id != self.id || witness.prev_hash != expected {
                return false;
            }
            match witness.digest() {
                Ok(hash) => expected = Some(hash),
                Err(_) => return false,
            }
        }
        !self.history.is_empty()
    }

    /// Check the record-level invariants: origin differs from destination and
    /// every stage reached carries its approver stamp.
    pub fn check_invariants(&self) -> bool {
        let moves =
            self.from_ward_id != self.to_ward_id || self.from_village_id != self.to_village_id;
        let paired =
            |by: &Option<String>, at: &Option<TimeStamp<Utc>>| by.is_some() == at.is_some();
        let stamps_paired = paired(&self.weo_approved_by, &self.weo_approved_at)
            && paired(&self.ward_approved_by, &self.ward_approved_at)
            && paired(&self.veo_accepted_by, &self.veo_accepted_at)
            && paired(&self.rejected_by, &self.rejected_at);
        let status_stamped = match self.status {
            TransferStatus::PendingApproval => true,
            TransferStatus::WeoApproved => self.weo_approved_by.is_some(),
            TransferStatus::WardApproved => self.ward_approved_by.is_some(),
            TransferStatus::VeoAccepted | TransferStatus::Completed => {
                self.veo_accepted_by.is_some()
            }
            TransferStatus::Rejected => {
                self.rejected_by.is_some() && self.rejection_reason.is_some()
            }
        };

        moves && stamps_paired && status_stamped
    }

    pub fn view_history(&self) {
        println!("History of transfer request: {}", self.id);
        println!("Current status: {}", self.status);
        for (index, witness) in self.history.iter().enumerate() {
            let entry = match &witness.witness_type {
                WitnessType::Submit { initiation_kind } => format!("submitted ({initiation_kind})"),
                WitnessType::Approve { from, to } => format!("approved {from} -> {to}"),
                WitnessType::Reject { reason } => format!("rejected: {reason}"),
                WitnessType::Cancel { reason } => format!("cancelled: {reason}"),
            };
            println!(
                "  {}. [{}] {} ({}) {}",
                index + 1,
                witness.timestamp.to_datetime_utc().format("%Y-%m-%d %H:%M:%S"),
                witness.actor_id,
                witness.role,
                entry
            );
        }
    }
}
