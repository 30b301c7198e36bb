//! Administrative hierarchy (Ward ⊃ Village) and the roles bound to it
use super::error::ValidationError;
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
pub struct WardId(#[n(0)] pub u64);

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
pub struct VillageId(#[n(0)] pub u64);

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Ward {
    #[n(0)]
    pub id: WardId,
    #[n(1)]
    pub name: String,
}

// a village belongs to exactly one ward
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Village {
    #[n(0)]
    pub id: VillageId,
    #[n(1)]
    pub ward_id: WardId,
    #[n(2)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum Role {
    #[n(0)]
    SuperAdmin,
    #[n(1)]
    WardAdmin,
    #[n(2)]
    WardExecutiveOfficer,
    #[n(3)]
    VillageExecutiveOfficer,
}

/// Where an actor's authority applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jurisdiction {
    Global,
    Ward(WardId),
    Village {
        ward: WardId, // implied parent of the village
        village: VillageId,
    },
}

/// An authenticated user as handed to us by the session layer.
///
/// The role/jurisdiction pairing is checked on construction, so a WardAdmin or
/// WEO always carries a ward and a VEO always carries a village.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: String,
    role: Role,
    jurisdiction: Jurisdiction,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::WardAdmin => "ward_admin",
            Role::WardExecutiveOfficer => "weo",
            Role::VillageExecutiveOfficer => "veo",
        }
    }
}

impl Actor {
    pub fn new(
        id: String,
        role: Role,
        jurisdiction: Jurisdiction,
    ) -> Result<Self, ValidationError> {
        let consistent = matches!(
            (role, jurisdiction),
            (Role::SuperAdmin, Jurisdiction::Global)
                | (Role::WardAdmin, Jurisdiction::Ward(_))
                | (Role::WardExecutiveOfficer, Jurisdiction::Ward(_))
                | (Role::VillageExecutiveOfficer, Jurisdiction::Village { .. })
        );
        if !consistent {
            return Err(ValidationError::JurisdictionMismatch { role });
        }

        Ok(Self {
            id,
            role,
            jurisdiction,
        })
    }
    pub fn super_admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::SuperAdmin,
            jurisdiction: Jurisdiction::Global,
        }
    }
    pub fn ward_admin(id: impl Into<String>, ward: WardId) -> Self {
        Self {
            id: id.into(),
            role: Role::WardAdmin,
            jurisdiction: Jurisdiction::Ward(ward),
        }
    }
    pub fn weo(id: impl Into<String>, ward: WardId) -> Self {
        Self {
            id: id.into(),
            role: Role::WardExecutiveOfficer,
            jurisdiction: Jurisdiction::Ward(ward),
        }
    }
    /// The ward is taken as given. Service calls check it against the village
    /// registry, and `TransferService::veo_for_village` looks it up instead.
    pub fn veo(id: impl Into<String>, ward: WardId, village: VillageId) -> Self {
        Self {
            id: id.into(),
            role: Role::VillageExecutiveOfficer,
            jurisdiction: Jurisdiction::Village { ward, village },
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn jurisdiction(&self) -> Jurisdiction {
        self.jurisdiction
    }
    /// The actor's ward. For a VEO this is the parent ward of their village.
    pub fn ward_id(&self) -> Option<WardId> {
        match self.jurisdiction {
            Jurisdiction::Global => None,
            Jurisdiction::Ward(ward) => Some(ward),
            Jurisdiction::Village { ward, .. } => Some(ward),
        }
    }
    pub fn village_id(&self) -> Option<VillageId> {
        match self.jurisdiction {
            Jurisdiction::Village { village, .. } => Some(village),
            _ => None,
        }
    }
}

impl fmt::Display for WardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ward#{}", self.0)
    }
}

impl fmt::Display for VillageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "village#{}", self.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
