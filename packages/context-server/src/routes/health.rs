use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct WelcomeResponse {
    message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Welcome message naming the service
pub async fn root_handler(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to the {}", state.app_name),
    })
}

/// Liveness check; the pipeline keeps no connections to check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
