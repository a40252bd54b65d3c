use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use salesmail::config::Config;
use salesmail::feedback::{FeedbackSink, FeedbackSinkKind, LogFeedbackSink, MlflowFeedbackSink};
use salesmail::generation::producer::EmailGenerator;
use salesmail::generation::retrieval::CustomerStore;
use salesmail::llm_client::ServingClient;
use salesmail::routes::build_router;
use salesmail::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sales email demo v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Environment: {}",
        if config.is_dev { "development" } else { "production" }
    );

    // Customer data
    let customers = CustomerStore::load_or_empty(&config.customer_data_path)?;

    // Model serving client
    let llm = ServingClient::new(
        config.databricks_host.clone(),
        config.databricks_token.clone(),
        config.llm_model.clone(),
    )
    .context("Failed to build serving client")?;
    info!(
        "Serving client initialized (model: {}, prompt: {:?})",
        config.llm_model, config.prompt_variant
    );

    // Feedback sink
    let feedback: Arc<dyn FeedbackSink> = match config.feedback_sink {
        FeedbackSinkKind::Log => Arc::new(LogFeedbackSink),
        FeedbackSinkKind::Mlflow => Arc::new(MlflowFeedbackSink::new(
            config.databricks_host.clone(),
            config.databricks_token.clone(),
        )?),
    };
    info!("Feedback sink: {:?}", config.feedback_sink);
    if config.experiment_id.is_empty() {
        tracing::warn!("MLFLOW_EXPERIMENT_ID is not set; experiment links will be incomplete");
    }

    let generator = EmailGenerator::new(
        Arc::new(llm),
        Arc::new(customers),
        config.prompt_variant,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        generator,
        feedback,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST and PORT must form a socket address")?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
