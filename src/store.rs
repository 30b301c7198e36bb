//! sled-backed persistence for transfer requests, residences and the
//! administrative units they reference.
//!
//! Every write that changes a request's status goes through [`TransferStore::commit`],
//! which re-reads the request inside a multi-tree transaction and only applies the
//! transition when the persisted status is still the one it was computed from.
use super::engine::Transition;
use super::error::{TransferError, ValidationError};
use super::jurisdiction::{Village, VillageId, Ward, WardId};
use super::request::TransferRequest;
use super::residence::{Residence, ResidenceId};
use sled::Db;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use std::sync::Arc;
use tracing::debug;

const TRANSFERS: &str = "transfers";
const RESIDENCES: &str = "residences";
const OPEN_TRANSFERS: &str = "open_transfers"; // residence key -> id of its non-terminal request
const WARDS: &str = "wards";
const VILLAGES: &str = "villages";

#[derive(Clone)]
pub struct TransferStore {
    instance: Arc<Db>,
    transfers: sled::Tree,
    residences: sled::Tree,
    open: sled::Tree,
    wards: sled::Tree,
    villages: sled::Tree,
    flush_on_commit: bool,
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, TransferError> {
    Ok(minicbor::to_vec(value)?)
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, TransferError> {
    Ok(minicbor::decode(bytes)?)
}

fn abort<T>(err: TransferError) -> ConflictableTransactionResult<T, TransferError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn unwrap_tx<T>(result: Result<T, TransactionError<TransferError>>) -> Result<T, TransferError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(err.into()),
    }
}

impl TransferStore {
    pub fn new(instance: Arc<Db>) -> Result<Self, TransferError> {
        Ok(Self {
            transfers: instance.open_tree(TRANSFERS)?,
            residences: instance.open_tree(RESIDENCES)?,
            open: instance.open_tree(OPEN_TRANSFERS)?,
            wards: instance.open_tree(WARDS)?,
            villages: instance.open_tree(VILLAGES)?,
            instance,
            flush_on_commit: false,
        })
    }

    /// Flush to disk after every successful commit.
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    fn flush(&self) -> Result<(), TransferError> {
        if self.flush_on_commit {
            self.instance.flush()?;
        }
        Ok(())
    }

    /// Register a ward. Ids are never reused, so an existing ward is refused.
    pub fn insert_ward(&self, ward: &Ward) -> Result<(), TransferError> {
        if !self.insert_absent(&self.wards, &ward.id.0.to_be_bytes(), encode(ward)?)? {
            return Err(ValidationError::WardExists(ward.id).into());
        }
        Ok(())
    }

    pub fn ward(&self, id: WardId) -> Result<Option<Ward>, TransferError> {
        match self.wards.get(id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Register a village. Its parent ward is fixed once written.
    pub fn insert_village(&self, village: &Village) -> Result<(), TransferError> {
        if !self.insert_absent(&self.villages, &village.id.0.to_be_bytes(), encode(village)?)? {
            return Err(ValidationError::VillageExists(village.id).into());
        }
        Ok(())
    }

    pub fn village(&self, id: VillageId) -> Result<Option<Village>, TransferError> {
        match self.villages.get(id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Add a household record. After this only [`TransferStore::commit`] moves it.
    pub fn insert_residence(&self, residence: &Residence) -> Result<(), TransferError> {
        if !self.insert_absent(&self.residences, &residence.id.to_key(), encode(residence)?)? {
            return Err(ValidationError::ResidenceExists(residence.id).into());
        }
        self.flush()
    }

    // false when the key is already taken
    fn insert_absent(
        &self,
        tree: &sled::Tree,
        key: &[u8],
        value: Vec<u8>,
    ) -> Result<bool, TransferError> {
        Ok(tree.compare_and_swap(key, None as Option<&[u8]>, Some(value))?.is_ok())
    }

    pub fn residence(&self, id: ResidenceId) -> Result<Option<Residence>, TransferError> {
        match self.residences.get(id.to_key())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Id of the non-terminal request open against a residence, if any.
    pub fn open_transfer(&self, id: ResidenceId) -> Result<Option<String>, TransferError> {
        match self.open.get(id.to_key())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    pub fn load(&self, request_id: &str) -> Result<TransferRequest, TransferError> {
        debug!(request_id, "loading transfer request");
        match self.transfers.get(request_id.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(TransferError::NotFound(request_id.to_string())),
        }
    }

    /// All requests, oldest first.
    pub fn list(&self) -> Result<Vec<TransferRequest>, TransferError> {
        let mut requests = self
            .transfers
            .iter()
            .values()
            .map(|bytes| decode::<TransferRequest>(&bytes?))
            .collect::<Result<Vec<_>, _>>()?;
        requests.sort_by_key(|request| request.requested_at.to_datetime_utc());
        Ok(requests)
    }

    /// Persist a freshly submitted request and mark its residence as having an
    /// open transfer. Fails if another request is already open for the residence.
    pub fn insert_new(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let key = request.id.as_bytes();
        let residence_key = request.residence_id.to_key();
        let encoded = encode(request)?;

        let result = (&self.transfers, &self.open).transaction(|(transfers, open)| {
            if let Some(existing) = open.get(residence_key)? {
                return abort(
                    ValidationError::TransferInFlight {
                        residence: request.residence_id,
                        request_id: String::from_utf8_lossy(&existing).into_owned(),
                    }
                    .into(),
                );
            }
            if transfers.get(key)?.is_some() {
                return abort(TransferError::PersistenceFailure(format!(
                    "transfer request {} already exists",
                    request.id
                )));
            }
            transfers.insert(key, encoded.clone())?;
            open.insert(&residence_key[..], key)?;
            Ok(())
        });
        unwrap_tx(result)?;

        debug!(request_id = %request.id, "inserted transfer request");
        self.flush()
    }

    /// Apply a computed transition atomically.
    ///
    /// The request is re-read inside the transaction; if its status is no longer
    /// `transition.expected` the commit aborts with `StaleState`. A relocating
    /// transition writes the destination onto the residence in the same
    /// transaction, and a terminal one clears the residence's open marker.
    pub fn commit(&self, transition: &Transition) -> Result<TransferRequest, TransferError> {
        let updated = &transition.updated;
        let key = updated.id.as_bytes();
        let encoded = encode(updated)?;

        let result = (&self.transfers, &self.residences, &self.open).transaction(
            |(transfers, residences, open)| {
                let current: TransferRequest = match transfers.get(key)? {
                    Some(bytes) => decode(&bytes).or_else(abort)?,
                    None => return abort(TransferError::NotFound(updated.id.clone())),
                };
                if current.status != transition.expected {
                    return abort(TransferError::StaleState {
                        request_id: current.id,
                        role: transition.role,
                        expected: transition.expected,
                        found: current.status,
                    });
                }

                let residence_key = current.residence_id.to_key();
                if transition.relocates {
                    let mut residence: Residence = match residences.get(residence_key)? {
                        Some(bytes) => decode(&bytes).or_else(abort)?,
                        None => {
                            let missing = ValidationError::UnknownResidence(current.residence_id);
                            return abort(missing.into());
                        }
                    };
                    residence.relocate(current.to_ward_id, current.to_village_id);
                    residences.insert(&residence_key[..], encode(&residence).or_else(abort)?)?;
                }
                if transition.is_terminal() {
                    open.remove(&residence_key[..])?;
                }
                transfers.insert(key, encoded.clone())?;
                Ok(())
            },
        );
        unwrap_tx(result)?;

        debug!(
            request_id = %updated.id,
            from = %transition.expected,
            to = %updated.status,
            relocated = transition.relocates,
            "committed transition"
        );
        self.flush()?;

        Ok(updated.clone())
    }
}
