use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub mlflow_experiment_id: String,
    pub environment: &'static str,
}

/// GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp_millis(),
        mlflow_experiment_id: state.config.experiment_id.clone(),
        environment: if state.config.is_dev {
            "development"
        } else {
            "production"
        },
    })
}
