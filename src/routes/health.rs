use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::models::MessageResponse;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

// GET / - Liveness check
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("API CASTELLET connexió OK!"))
}

// GET /health - Readiness: the store must answer a counter read
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = chrono::Utc::now().timestamp();

    match state.store.read_counter().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                error: None,
                timestamp,
            }),
        ),
        Err(err) => {
            tracing::warn!("Health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    error: Some(err.to_string()),
                    timestamp,
                }),
            )
        }
    }
}
