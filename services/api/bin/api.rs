//! Main Entrypoint for the Cogniview API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading prompt templates, falling back to the built-in ones.
//! 3. Initializing shared services (completion client, action dispatcher,
//!    feedback scoring).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use cogniview_api::{config::Config, router::create_router, state::AppState};
use cogniview_core::{
    ActionDispatcher, ActionRegistry, ActionsConfig, Assistant, CompletionClient,
    CompletionConfig,
    actions::{fetcher::HttpJsonFetcher, todo::TodoStore},
    feedback::LlmFeedbackService,
    llm_client::{GeminiTransport, ModelEndpoint},
    prompt::{DEFAULT_FEEDBACK_PROMPT, DEFAULT_SYSTEM_PROMPT, Instructions},
};
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Loads every `*.md` file in `prompts_path`, keyed by file stem.
/// A missing directory yields no overrides.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    if !prompts_path.is_dir() {
        warn!(path = %prompts_path.display(), "Prompts directory not found; using built-in prompts");
        return Ok(prompts);
    }
    for entry in fs::read_dir(prompts_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt {}", path.display()))?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 2. Prompts ---
    let mut prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .remove("system_prompt")
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let feedback_prompt = prompts
        .remove("feedback")
        .unwrap_or_else(|| DEFAULT_FEEDBACK_PROMPT.to_string());

    // --- 3. Initialize Shared Services ---
    let registry = ActionRegistry::new();
    let instructions = Instructions::new(system_prompt, &registry);

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; completion requests will fail with configuration_missing");
    }
    let transport = GeminiTransport::new(config.gemini_api_base.clone())
        .context("Failed to build completion transport")?;
    let completion = Arc::new(CompletionClient::new(
        Arc::new(transport),
        CompletionConfig {
            api_key: config.gemini_api_key.take(),
            endpoints: config
                .completion_models
                .iter()
                .map(|m| ModelEndpoint::new(m.as_str()))
                .collect(),
            endpoint_timeout: config.endpoint_timeout,
        },
        instructions,
    ));

    let fetcher = HttpJsonFetcher::new(config.endpoint_timeout)
        .context("Failed to build upstream HTTP client")?;
    let dispatcher = Arc::new(ActionDispatcher::new(
        registry,
        Arc::new(TodoStore::new()),
        Arc::new(fetcher),
        ActionsConfig {
            github_api_base: config.github_api_base.clone(),
            github_token: config.github_token.take(),
            weather_api_base: config.openweather_api_base.clone(),
            weather_api_key: config.openweather_api_key.take(),
        },
    ));

    let feedback_service = Arc::new(LlmFeedbackService::new(completion.clone(), feedback_prompt));
    let assistant = Arc::new(Assistant::new(completion, dispatcher));
    let app_state = Arc::new(AppState::new(assistant, feedback_service));

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        models = ?config.completion_models,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
