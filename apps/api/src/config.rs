use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::feedback::FeedbackSinkKind;
use crate::llm_client::prompts::PromptVariant;

/// Notebooks linked from the walkthrough pages, in walkthrough order.
pub const NOTEBOOK_NAMES: [&str; 5] = [
    "1_observe_with_traces",
    "2_create_quality_metrics",
    "3_find_fix_quality_issues",
    "4_human_review",
    "5_production_monitoring",
];

/// Pre-computed demo artifacts produced by the setup scripts. All optional.
#[derive(Debug, Clone, Default)]
pub struct DemoLinks {
    pub low_accuracy_results_url: Option<String>,
    pub regression_results_url: Option<String>,
    pub sample_trace_id: Option<String>,
    pub sample_labeling_session_id: Option<String>,
    pub sample_review_app_url: Option<String>,
    pub sample_labeling_trace_id: Option<String>,
    /// Keyed by notebook name, e.g. `1_observe_with_traces`.
    pub notebook_urls: HashMap<String, String>,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub databricks_host: String,
    pub databricks_token: String,
    pub llm_model: String,
    pub experiment_id: String,
    pub prompt_variant: PromptVariant,
    pub feedback_sink: FeedbackSinkKind,
    pub customer_data_path: PathBuf,
    pub client_build_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub is_dev: bool,
    pub rust_log: String,
    pub links: DemoLinks,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let notebook_urls = NOTEBOOK_NAMES
            .iter()
            .filter_map(|name| {
                get(&format!("NOTEBOOK_URL_{name}")).map(|url| (name.to_string(), url))
            })
            .collect();

        Ok(Config {
            databricks_host: ensure_https(&require("DATABRICKS_HOST")?),
            databricks_token: require("DATABRICKS_TOKEN")?,
            llm_model: require("LLM_MODEL")?,
            experiment_id: get("MLFLOW_EXPERIMENT_ID").unwrap_or_default(),
            prompt_variant: match get("PROMPT_VARIANT") {
                Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
                None => PromptVariant::default(),
            },
            feedback_sink: match get("FEEDBACK_SINK") {
                Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
                None => FeedbackSinkKind::default(),
            },
            customer_data_path: get("CUSTOMER_DATA_PATH")
                .unwrap_or_else(|| "data/input_data.jsonl".to_string())
                .into(),
            client_build_dir: get("CLIENT_BUILD_DIR")
                .unwrap_or_else(|| "client/build".to_string())
                .into(),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            is_dev: get("IS_DEV").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            links: DemoLinks {
                low_accuracy_results_url: get("LOW_ACCURACY_RESULTS_URL"),
                regression_results_url: get("REGRESSION_RESULTS_URL"),
                sample_trace_id: get("SAMPLE_TRACE_ID"),
                sample_labeling_session_id: get("SAMPLE_LABELING_SESSION_ID"),
                sample_review_app_url: get("SAMPLE_REVIEW_APP_URL"),
                sample_labeling_trace_id: get("SAMPLE_LABELING_TRACE_ID"),
                notebook_urls,
            },
        })
    }
}

/// Workspace hosts are often configured without a scheme.
pub fn ensure_https(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() || host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
