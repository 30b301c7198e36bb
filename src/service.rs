//! Service layer API for relocation workflow operations
use super::engine::TransitionEngine;
use super::error::{TransferError, ValidationError};
use super::jurisdiction::{Actor, Village, VillageId, Ward, WardId};
use super::policy::{self, Action};
use super::request::{InitiationKind, TimeStamp, TransferRequest};
use super::residence::{Residence, ResidenceId};
use super::store::TransferStore;
use super::utils;
use super::visibility::{self, Listing};
use std::sync::Arc;
use tracing::{info, warn};

const REQUEST_HRP: &str = "transfer_";

pub struct TransferService {
    store: TransferStore,
    engine: TransitionEngine,
}

impl TransferService {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, TransferError> {
        Ok(Self::with_engine(TransferStore::new(instance)?, TransitionEngine::default()))
    }

    pub fn with_engine(store: TransferStore, engine: TransitionEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    pub fn register_ward(&self, id: WardId, name: &str) -> Result<Ward, TransferError> {
        let ward = Ward {
            id,
            name: name.to_string(),
        };
        self.store.insert_ward(&ward)?;
        Ok(ward)
    }

    pub fn register_village(
        &self,
        id: VillageId,
        ward_id: WardId,
        name: &str,
    ) -> Result<Village, TransferError> {
        if self.store.ward(ward_id)?.is_none() {
            return Err(ValidationError::UnknownWard(ward_id).into());
        }
        let village = Village {
            id,
            ward_id,
            name: name.to_string(),
        };
        self.store.insert_village(&village)?;
        Ok(village)
    }

    /// Add a household record. Its village must be registered under its ward,
    /// and an already registered residence is refused: its location only changes
    /// when a transfer completes.
    pub fn register_residence(&self, residence: Residence) -> Result<Residence, TransferError> {
        self.check_village_in_ward(residence.village_id, residence.ward_id)?;
        self.store.insert_residence(&residence)?;
        Ok(residence)
    }

    /// Build a VEO actor, looking up the parent ward of their village.
    pub fn veo_for_village(
        &self,
        actor_id: &str,
        village_id: VillageId,
    ) -> Result<Actor, TransferError> {
        let village = self
            .store
            .village(village_id)?
            .ok_or(ValidationError::UnknownVillage(village_id))?;
        Ok(Actor::veo(actor_id, village.ward_id, village.id))
    }

    fn check_village_in_ward(
        &self,
        village_id: VillageId,
        ward_id: WardId,
    ) -> Result<(), TransferError> {
        let village = self
            .store
            .village(village_id)?
            .ok_or(ValidationError::UnknownVillage(village_id))?;
        if village.ward_id != ward_id {
            return Err(ValidationError::VillageOutsideWard {
                village: village_id,
                ward: ward_id,
                actual: village.ward_id,
            }
            .into());
        }
        Ok(())
    }

    // A VEO's ward is taken on trust from the session layer; hold it to the registry.
    fn check_actor(&self, actor: &Actor) -> Result<(), TransferError> {
        if let (Some(ward), Some(village)) = (actor.ward_id(), actor.village_id()) {
            self.check_village_in_ward(village, ward)?;
        }
        Ok(())
    }

    /// Submit a new relocation request in `pending_approval`
    pub fn submit_transfer(
        &self,
        residence_id: ResidenceId,
        to_ward_id: WardId,
        to_village_id: VillageId,
        initiation_kind: InitiationKind,
        requester: &Actor,
    ) -> Result<TransferRequest, TransferError> {
        self.check_actor(requester)?;
        if InitiationKind::for_role(requester.role()) != Some(initiation_kind) {
            return Err(ValidationError::InitiationMismatch {
                role: requester.role(),
                kind: initiation_kind,
            }
            .into());
        }

        let residence = self
            .store
            .residence(residence_id)?
            .ok_or(ValidationError::UnknownResidence(residence_id))?;
        self.check_village_in_ward(to_village_id, to_ward_id)?;

        let id = utils::new_uuid_to_bech32(REQUEST_HRP).map_err(|err| {
            TransferError::PersistenceFailure(format!("failed to allocate request id: {err}"))
        })?;

        let request = TransferRequest::new(
            id,
            &residence,
            to_ward_id,
            to_village_id,
            initiation_kind,
            requester,
            TimeStamp::new(),
        )?;
        self.store.insert_new(&request)?;

        info!(
            request_id = %request.id,
            residence = %residence_id,
            from = %request.from_village_id,
            to = %request.to_village_id,
            kind = %initiation_kind,
            actor = requester.id(),
            "transfer submitted"
        );

        Ok(request)
    }

    pub fn get(&self, request_id: &str) -> Result<TransferRequest, TransferError> {
        self.store.load(request_id)
    }

    pub fn residence(&self, residence_id: ResidenceId) -> Result<Residence, TransferError> {
        Ok(self
            .store
            .residence(residence_id)?
            .ok_or(ValidationError::UnknownResidence(residence_id))?)
    }

    pub fn transfers_for_residence(
        &self,
        residence_id: ResidenceId,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|request| request.residence_id == residence_id)
            .collect())
    }

    /// Requests the actor may see in the tracking listing.
    pub fn list_visible(&self, actor: &Actor) -> Result<Vec<TransferRequest>, TransferError> {
        self.list_visible_in(actor, Listing::Tracking)
    }

    pub fn list_visible_in(
        &self,
        actor: &Actor,
        listing: Listing,
    ) -> Result<Vec<TransferRequest>, TransferError> {
        self.check_actor(actor)?;
        let requests = self.store.list()?;
        Ok(visibility::filter_visible(actor, &requests, listing))
    }

    pub fn available_actions(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<Vec<Action>, TransferError> {
        self.check_actor(actor)?;
        let request = self.store.load(request_id)?;
        Ok(policy::applicable_actions(actor, &request))
    }

    pub fn approve(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<TransferRequest, TransferError> {
        self.act(actor, request_id, Action::Approve, None)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        request_id: &str,
        reason: &str,
    ) -> Result<TransferRequest, TransferError> {
        self.act(actor, request_id, Action::Reject, Some(reason))
    }

    pub fn cancel(
        &self,
        actor: &Actor,
        request_id: &str,
        reason: &str,
    ) -> Result<TransferRequest, TransferError> {
        self.act(actor, request_id, Action::Cancel, Some(reason))
    }

    // read, compute, then compare-and-swap on the status that was read
    fn act(
        &self,
        actor: &Actor,
        request_id: &str,
        action: Action,
        reason: Option<&str>,
    ) -> Result<TransferRequest, TransferError> {
        self.check_actor(actor)?;
        let request = self.store.load(request_id)?;

        let transition = self
            .engine
            .plan(&request, actor, action, reason, TimeStamp::new())
            .inspect_err(|err| {
                if let TransferError::PermissionDenied { .. } = err {
                    warn!(
                        request_id,
                        actor = actor.id(),
                        role = %actor.role(),
                        %action,
                        "permission denied"
                    );
                }
            })?;

        let committed = self.store.commit(&transition).inspect_err(|err| {
            if err.is_retryable() {
                warn!(request_id, actor = actor.id(), %action, "lost race on transfer: {err}");
            }
        })?;

        info!(
            request_id,
            actor = actor.id(),
            role = %actor.role(),
            %action,
            from = %transition.expected,
            to = %committed.status,
            "transfer advanced"
        );
        if transition.relocates {
            info!(
                request_id,
                residence = %committed.residence_id,
                ward = %committed.to_ward_id,
                village = %committed.to_village_id,
                "residence relocated"
            );
        }

        Ok(committed)
    }
}
