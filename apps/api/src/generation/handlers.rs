//! Axum route handlers for the customer catalog and email generation.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::StreamExt;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::generation::retrieval::CompanySummary;
use crate::models::email::{EmailOutput, GenerateEmailRequest};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/companies
pub async fn handle_companies(State(state): State<AppState>) -> Json<Vec<CompanySummary>> {
    Json(state.generator.customers().companies())
}

/// GET /api/customer/:name
///
/// Returns the raw customer record as stored in the data file.
pub async fn handle_customer(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    state
        .generator
        .customers()
        .find(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Customer '{name}' not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate-email-stream-with-retrieval/
///
/// Always answers 200 with an event stream. Failures, including an unknown
/// customer, arrive as the stream's single terminal `error` event.
pub async fn handle_generate_stream(
    State(state): State<AppState>,
    Json(request): Json<GenerateEmailRequest>,
) -> impl IntoResponse {
    info!(customer = %request.customer_name, "Streaming email generation");

    let events = state
        .generator
        .stream_events(request)
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_frame_payload())));

    let sse = Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    // Keeps reverse proxies from holding tokens back.
    ([("x-accel-buffering", "no")], sse)
}

/// POST /api/generate-email-with-retrieval/
///
/// Same pipeline as the streaming endpoint, reduced to the final email.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateEmailRequest>,
) -> Result<Json<EmailOutput>, AppError> {
    if request.customer_name.trim().is_empty() {
        return Err(AppError::Validation("customer_name cannot be empty".to_string()));
    }

    let output = state.generator.generate_complete(request).await?;
    Ok(Json(output))
}
