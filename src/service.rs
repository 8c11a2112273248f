//! Reconciliation operations and the decay cycle.
//!
//! Every mutation of the pet store or session registry goes through here.
//! Within one operation the state write always happens before the push
//! attempt, and a push failure never rolls the write back: persistence is
//! authoritative, delivery is best effort.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Database;
use crate::models::*;
use crate::push::{ApnsClient, DeliveryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The operation's target row does not exist. Expected (stale client
    /// retries hit this constantly); surfaced as 404, never logged as an
    /// error.
    #[error("not found")]
    NotFound,

    /// The store itself failed; aborts the operation.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Summary of one decay pass, returned from the manual trigger endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DecayReport {
    /// Pets whose attributes were aged this pass.
    pub decayed: usize,
    /// Sessions that received a push.
    pub pushed: usize,
    /// Sessions deleted because APNs reported their token dead.
    pub pruned: usize,
    /// Sessions whose push failed transiently; retried next pass.
    pub failed: usize,
}

/// Register a Live Activity session for a pet.
///
/// Creates the pet's state row on first contact (hunger 0, happiness 100),
/// then upserts the session keyed by the pet's one-session uniqueness. No
/// push is sent; the device already renders its local state.
pub fn register(db: &Database, input: &RegisterInput) -> ServiceResult<Session> {
    db.ensure_pet_state(&input.pet_id, &input.species_id)?;
    let session = db.upsert_session(input)?;
    Ok(session)
}

/// Attach a fresh delivery token to an existing session.
pub fn refresh_token(db: &Database, input: &RefreshTokenInput) -> ServiceResult<()> {
    if db.update_session_token(&input.activity_id, &input.token)? {
        Ok(())
    } else {
        Err(ServiceError::NotFound)
    }
}

/// Rename a session when the device recreates its activity instance but
/// should keep the pet's existing session (and token) rather than register
/// anew.
pub fn rename_session(db: &Database, input: &RenameSessionInput) -> ServiceResult<()> {
    if db.rename_session(&input.old_activity_id, &input.new_activity_id)? {
        Ok(())
    } else {
        Err(ServiceError::NotFound)
    }
}

/// Persist new attribute values (clamped) and push them to the pet's active
/// session, if it has a token.
pub async fn update_state(
    db: &Database,
    apns: &ApnsClient,
    input: &UpdateStateInput,
) -> ServiceResult<PetState> {
    let state = db
        .update_pet_state(&input.pet_id, input.state)?
        .ok_or(ServiceError::NotFound)?;

    if let Some(session) = db.get_session_for_pet(&input.pet_id)? {
        if let Some(token) = session.token.clone() {
            let attributes = PetAttributes {
                hunger: state.hunger,
                happiness: state.happiness,
            };
            push_to_session(db, apns, &session.activity_id, &token, &attributes).await?;
        }
    }

    Ok(state)
}

/// Delete a session. Idempotent: ending an already-gone session is fine.
pub fn end_session(db: &Database, activity_id: &str) -> ServiceResult<()> {
    db.delete_session(activity_id)?;
    Ok(())
}

/// Delete a pet and its session. Idempotent.
pub fn remove_pet(db: &Database, pet_id: &str) -> ServiceResult<()> {
    db.delete_pet(pet_id)?;
    Ok(())
}

pub fn get_pet(db: &Database, pet_id: &str) -> ServiceResult<PetState> {
    db.get_pet_state(pet_id)?.ok_or(ServiceError::NotFound)
}

/// One decay pass: age every stale pet, then synchronize every active
/// session that has a token.
///
/// All sessions are pushed, not only the just-decayed ones, so a session
/// that missed a push self-heals on the next cycle. Each session is handled
/// independently; one delivery failure never aborts the rest of the pass.
pub async fn run_decay_cycle(
    db: &Database,
    apns: &ApnsClient,
    staleness: Duration,
) -> ServiceResult<DecayReport> {
    let mut report = DecayReport {
        decayed: db.decay_stale(staleness)?.len(),
        ..Default::default()
    };

    for session in db.get_active_sessions()? {
        let Some(token) = &session.token else {
            continue;
        };
        match push_to_session(db, apns, &session.activity_id, token, &session.attributes).await? {
            PushOutcome::Delivered => report.pushed += 1,
            PushOutcome::Pruned => report.pruned += 1,
            PushOutcome::Failed => report.failed += 1,
        }
    }

    tracing::info!(
        decayed = report.decayed,
        pushed = report.pushed,
        pruned = report.pruned,
        failed = report.failed,
        "decay cycle complete"
    );
    Ok(report)
}

enum PushOutcome {
    Delivered,
    Pruned,
    Failed,
}

/// Deliver to one session and apply the classification policy: a dead token
/// deletes the session, a transient failure is logged and kept.
///
/// Only a store error propagates; delivery errors are contained here.
async fn push_to_session(
    db: &Database,
    apns: &ApnsClient,
    activity_id: &str,
    token: &str,
    attributes: &PetAttributes,
) -> ServiceResult<PushOutcome> {
    match apns.deliver(token, attributes).await {
        Ok(()) => {
            tracing::debug!(activity_id, "pushed state update");
            Ok(PushOutcome::Delivered)
        }
        Err(DeliveryError::TokenInvalid { reason }) => {
            tracing::info!(activity_id, %reason, "token dead, pruning session");
            db.delete_session(activity_id)?;
            Ok(PushOutcome::Pruned)
        }
        Err(err @ DeliveryError::Transient { .. }) => {
            tracing::warn!(activity_id, error = %err, "push failed, keeping session");
            Ok(PushOutcome::Failed)
        }
    }
}
