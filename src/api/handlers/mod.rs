use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::AppState;
use crate::models::*;
use crate::service::{self, DecayReport, ServiceError};

// ============================================================
// Error Handling
// ============================================================

/// Map a service error onto an HTTP response.
///
/// `NotFound` is an expected condition (stale client retries) and is never
/// logged as an error. Store errors are logged server-side in full; clients
/// only see a generic message to avoid leaking internals.
fn service_error(e: ServiceError) -> (StatusCode, String) {
    match e {
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        ServiceError::Store(err) => {
            tracing::error!("Store error: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Session lifecycle
// ============================================================

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<Session>, (StatusCode, String)> {
    service::register(&state.db, &input)
        .map(Json)
        .map_err(service_error)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(input): Json<RefreshTokenInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    service::refresh_token(&state.db, &input)
        .map(|_| StatusCode::OK)
        .map_err(service_error)
}

pub async fn rename_session(
    State(state): State<AppState>,
    Json(input): Json<RenameSessionInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    service::rename_session(&state.db, &input)
        .map(|_| StatusCode::OK)
        .map_err(service_error)
}

pub async fn end_session(
    State(state): State<AppState>,
    Json(input): Json<EndSessionInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    service::end_session(&state.db, &input.activity_id)
        .map(|_| StatusCode::OK)
        .map_err(service_error)
}

// ============================================================
// Pet state
// ============================================================

pub async fn update_state(
    State(state): State<AppState>,
    Json(input): Json<UpdateStateInput>,
) -> Result<Json<PetState>, (StatusCode, String)> {
    service::update_state(&state.db, &state.apns, &input)
        .await
        .map(Json)
        .map_err(service_error)
}

pub async fn get_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> Result<Json<PetState>, (StatusCode, String)> {
    service::get_pet(&state.db, &pet_id)
        .map(Json)
        .map_err(service_error)
}

pub async fn remove_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    service::remove_pet(&state.db, &pet_id)
        .map(|_| StatusCode::OK)
        .map_err(service_error)
}

// ============================================================
// Maintenance
// ============================================================

pub async fn trigger_decay(
    State(state): State<AppState>,
) -> Result<Json<DecayReport>, (StatusCode, String)> {
    service::run_decay_cycle(&state.db, &state.apns, state.staleness)
        .await
        .map(Json)
        .map_err(service_error)
}
