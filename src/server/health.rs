use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "environment": state.deployment_mode.to_string(),
        "backend": state.backend_name(),
        "connections": state.sessions.live_connections(),
    }))
}
