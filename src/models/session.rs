use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An active Live Activity session for a pet.
///
/// Sessions are **ephemeral**—they exist only while a device is showing the
/// activity. At most one session exists per pet: registering a second
/// activity for the same pet replaces the first (upsert by `pet_id`, not by
/// `activity_id`). The delivery token is null until the device reports one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Caller-supplied activity identifier; may be renamed when the device
    /// recreates its activity instance.
    #[serde(rename = "activityID")]
    pub activity_id: String,
    #[serde(rename = "petID")]
    pub pet_id: String,
    #[serde(rename = "speciesID")]
    pub species_id: String,
    pub token: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Input for registering a Live Activity session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    #[serde(rename = "petID")]
    pub pet_id: String,
    #[serde(rename = "speciesID")]
    pub species_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Input for attaching a fresh APNs token to an existing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenInput {
    #[serde(rename = "activityID")]
    pub activity_id: String,
    pub token: String,
}

/// Input for renaming a session when the device recreates its activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameSessionInput {
    #[serde(rename = "oldActivityID")]
    pub old_activity_id: String,
    #[serde(rename = "newActivityID")]
    pub new_activity_id: String,
}

/// Input for ending a session when the user dismisses the activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionInput {
    #[serde(rename = "activityID")]
    pub activity_id: String,
}

/// A session joined with its pet's current attributes, as selected by the
/// decay cycle for pushing.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub activity_id: String,
    pub pet_id: String,
    pub token: Option<String>,
    pub attributes: super::PetAttributes,
}
