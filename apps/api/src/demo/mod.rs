//! Read-only endpoints backing the walkthrough pages: experiment links,
//! setup-script artifacts, notebook URLs and the prompt templates.

pub mod links;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::demo::links::{notebook_url, ExperimentInfo, ExperimentLinks, NotebookUrl, PreloadedResults};
use crate::llm_client::prompts::PromptVariant;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt: &'static str,
}

/// GET /api/tracing_experiment
pub async fn handle_tracing_experiment(State(state): State<AppState>) -> Json<ExperimentInfo> {
    let config = &state.config;
    Json(ExperimentLinks::new(&config.databricks_host, &config.experiment_id).experiment_info())
}

/// GET /api/preloaded-results
pub async fn handle_preloaded_results(State(state): State<AppState>) -> Json<PreloadedResults> {
    let config = &state.config;
    Json(
        ExperimentLinks::new(&config.databricks_host, &config.experiment_id)
            .preloaded_results(&config.links),
    )
}

/// GET /api/get-notebook-url/:name
pub async fn handle_notebook_url(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<NotebookUrl> {
    Json(notebook_url(&state.config.links, &name))
}

/// GET /api/original-prompt
pub async fn handle_original_prompt() -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: PromptVariant::Original.template(),
    })
}

/// GET /api/fixed-prompt
pub async fn handle_fixed_prompt() -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: PromptVariant::Fixed.template(),
    })
}

/// GET /api/current-production-prompt
///
/// The template the generator is actually running with.
pub async fn handle_current_prompt(State(state): State<AppState>) -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: state.generator.prompt().template(),
    })
}
