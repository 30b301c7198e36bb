use super::jurisdiction::{VillageId, WardId};
use super::request::TimeStamp;
use chrono::Utc;
use std::fmt;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(array)]
pub struct ResidenceId(#[n(0)] pub u64);

// the household record owned by the registry. only the jurisdiction fields are
// ever written by a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Residence {
    #[n(0)]
    pub id: ResidenceId,
    #[n(1)]
    pub household_head: String,
    #[n(2)]
    pub ward_id: WardId,
    #[n(3)]
    pub village_id: VillageId,
    #[n(4)]
    pub registered_at: TimeStamp<Utc>,
}

impl ResidenceId {
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl Residence {
    pub fn new(
        id: ResidenceId,
        household_head: &str,
        ward_id: WardId,
        village_id: VillageId,
    ) -> Self {
        Self {
            id,
            household_head: household_head.to_string(),
            ward_id,
            village_id,
            registered_at: TimeStamp::new(),
        }
    }
    pub fn relocate(&mut self, ward_id: WardId, village_id: VillageId) {
        self.ward_id = ward_id;
        self.village_id = village_id;
    }
}

impl fmt::Display for ResidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "residence#{}", self.0)
    }
}
