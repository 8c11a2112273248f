use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authoritative server-side state of a pet.
///
/// One row per pet. `hunger` and `happiness` are always within `0..=100`;
/// every mutator clamps before writing. `last_updated` is refreshed on every
/// mutation and drives decay staleness selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetState {
    #[serde(rename = "petID")]
    pub pet_id: String,
    /// Display/asset selector, immutable after creation.
    #[serde(rename = "speciesID")]
    pub species_id: String,
    pub hunger: i64,
    pub happiness: i64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

/// The hunger/happiness pair as pushed to the Live Activity
/// (`content-state` in the APNs payload).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetAttributes {
    pub hunger: i64,
    pub happiness: i64,
}

impl PetAttributes {
    /// Clamp both attributes into `0..=100`.
    pub fn clamped(self) -> Self {
        Self {
            hunger: self.hunger.clamp(0, 100),
            happiness: self.happiness.clamp(0, 100),
        }
    }
}

/// Input for the update operation: new attribute values for a pet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStateInput {
    #[serde(rename = "petID")]
    pub pet_id: String,
    pub state: PetAttributes,
}
