//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ActionInfo, ChatRequest, ChatResponse, CompletionRequest, CompletionResponse,
        ErrorResponse, FeedbackRequest, InvokeActionRequest, TodosResponse,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::chat,
        handlers::complete,
        handlers::list_actions,
        handlers::invoke_action,
        handlers::list_todos,
        handlers::generate_feedback,
    ),
    components(
        schemas(ChatRequest, ChatResponse, CompletionRequest, CompletionResponse, ActionInfo, InvokeActionRequest, TodosResponse, FeedbackRequest, ErrorResponse)
    ),
    tags(
        (name = "Cogniview API", description = "Conversational assistant with actions, completions and interview feedback")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/chat/completions", post(handlers::complete))
        .route("/actions", get(handlers::list_actions))
        .route("/actions/{name}", post(handlers::invoke_action))
        .route("/todos", get(handlers::list_todos))
        .route("/feedback", post(handlers::generate_feedback))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
