use super::jurisdiction::{Role, VillageId, WardId};
use super::policy::Action;
use super::request::{InitiationKind, TransferStatus};
use super::residence::ResidenceId;
use std::convert::Infallible;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Transfer to {ward}/{village} would not move the residence")]
    NoOpTransfer { ward: WardId, village: VillageId },
    #[error("Role {role} cannot be bound to the given jurisdiction")]
    JurisdictionMismatch { role: Role },
    #[error("{role} cannot submit a {kind} transfer")]
    InitiationMismatch { role: Role, kind: InitiationKind },
    #[error("{0} is not registered")]
    UnknownResidence(ResidenceId),
    #[error("{0} is not registered")]
    UnknownWard(WardId),
    #[error("{0} is not registered")]
    UnknownVillage(VillageId),
    #[error("{village} belongs to {actual}, not {ward}")]
    VillageOutsideWard {
        village: VillageId,
        ward: WardId,
        actual: WardId,
    },
    #[error("{0} is already registered")]
    WardExists(WardId),
    #[error("{0} is already registered")]
    VillageExists(VillageId),
    #[error("{0} is already registered")]
    ResidenceExists(ResidenceId),
    #[error("{residence} already has an open transfer {request_id}")]
    TransferInFlight {
        residence: ResidenceId,
        request_id: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("Transfer request {0} not found")]
    NotFound(String),
    #[error("{role} may not {action} transfer {request_id} while it is {status}")]
    PermissionDenied {
        request_id: String,
        role: Role,
        action: Action,
        status: TransferStatus,
    },
    #[error("No {action} transition for {role} on transfer {request_id} while it is {status}")]
    InvalidTransition {
        request_id: String,
        role: Role,
        action: Action,
        status: TransferStatus,
    },
    #[error("{role} must give a non-empty reason to {action} transfer {request_id} ({status})")]
    MissingReason {
        request_id: String,
        role: Role,
        action: Action,
        status: TransferStatus,
    },
    #[error("Transfer {request_id} changed from {expected} to {found} before {role} could commit")]
    StaleState {
        request_id: String,
        role: Role,
        expected: TransferStatus,
        found: TransferStatus,
    },
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TransferError {
    /// Only a lost compare-and-swap is worth retrying, after re-reading the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::StaleState { .. })
    }
}

impl From<sled::Error> for TransferError {
    fn from(value: sled::Error) -> Self {
        TransferError::PersistenceFailure(value.to_string())
    }
}

impl From<minicbor::decode::Error> for TransferError {
    fn from(value: minicbor::decode::Error) -> Self {
        TransferError::PersistenceFailure(format!("failed to decode record: {value}"))
    }
}

impl From<minicbor::encode::Error<Infallible>> for TransferError {
    fn from(value: minicbor::encode::Error<Infallible>) -> Self {
        TransferError::PersistenceFailure(format!("failed to encode record: {value}"))
    }
}
