mod handlers;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::push::ApnsClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub apns: ApnsClient,
    pub staleness: chrono::Duration,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/register", post(handlers::register))
        .route("/register/token", post(handlers::refresh_token))
        .route("/register/rename-session", patch(handlers::rename_session))
        .route("/end", post(handlers::end_session))
        // Pet state
        .route("/update", post(handlers::update_state))
        .route("/pets/{pet_id}", get(handlers::get_pet))
        .route("/pets/{pet_id}", delete(handlers::remove_pet))
        // Maintenance
        .route("/decay", post(handlers::trigger_decay))
        // Health
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
