//! Axum Handlers for the REST API
//!
//! Thin adapters from HTTP to the assistant core. Every handler is documented
//! with `utoipa` for the OpenAPI document.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use cogniview_core::{
    ActionDirective, ActionResult, CompletionError, CompletionOptions, ErrorKind,
    actions::registry::Lookup,
    feedback::{Feedback, FeedbackError},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{
        ActionInfo, ChatRequest, ChatResponse, CompletionRequest, CompletionResponse,
        ErrorResponse, FeedbackRequest, InvokeActionRequest, TodosResponse,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// A collaborator is missing configuration or temporarily unusable.
    ServiceUnavailable(String, ErrorKind),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message,
                    error_kind: None,
                },
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    message,
                    error_kind: None,
                },
            ),
            ApiError::ServiceUnavailable(message, kind) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    message,
                    error_kind: Some(kind.as_str().to_string()),
                },
            ),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "An internal server error occurred.".to_string(),
                        error_kind: None,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ApiError {
    fn from_completion(err: CompletionError) -> Self {
        match err {
            CompletionError::NotConfigured => {
                ApiError::ServiceUnavailable(err.to_string(), ErrorKind::ConfigurationMissing)
            }
            CompletionError::EmptyHistory => ApiError::BadRequest(err.to_string()),
        }
    }

    fn from_feedback(err: FeedbackError) -> Self {
        match err {
            FeedbackError::EmptyTranscript => ApiError::BadRequest(err.to_string()),
            FeedbackError::Completion(inner) => ApiError::from_completion(inner),
            FeedbackError::Unavailable => {
                ApiError::ServiceUnavailable(err.to_string(), ErrorKind::UpstreamError)
            }
            FeedbackError::Malformed(_) => ApiError::InternalServerError(err.into()),
        }
    }
}

fn completion_options(max_tokens: Option<u32>, temperature: Option<f32>) -> CompletionOptions {
    let defaults = CompletionOptions::default();
    CompletionOptions {
        max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
        temperature: temperature.unwrap_or(defaults.temperature),
    }
}

/// Send a user message through the assistant, running at most one action.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply and extended history", body = ChatResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 503, description = "Completion provider not configured", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let options = completion_options(payload.max_tokens, payload.temperature);
    let exchange = state
        .assistant
        .handle_user_message(&payload.history, &payload.message, options)
        .await
        .map_err(ApiError::from_completion)?;

    Ok(Json(ChatResponse {
        degraded: exchange.is_degraded(),
        served_by: exchange.served_by.as_str().to_string(),
        reply: exchange.reply,
        history: exchange.history,
        action: exchange.action,
    }))
}

/// Run a raw completion over a message list, without action handling.
#[utoipa::path(
    post,
    path = "/chat/completions",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Completion text", body = CompletionResponse),
        (status = 400, description = "Empty message list", body = ErrorResponse),
        (status = 503, description = "Completion provider not configured", body = ErrorResponse)
    )
)]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let options = completion_options(payload.max_tokens, payload.temperature);
    let outcome = state
        .completion()
        .complete(&payload.messages, options)
        .await
        .map_err(ApiError::from_completion)?;

    Ok(Json(CompletionResponse {
        is_fallback: outcome.is_degraded(),
        model: outcome.served_by.as_str().to_string(),
        output: outcome.text,
    }))
}

/// List the actions the assistant can run.
#[utoipa::path(
    get,
    path = "/actions",
    responses(
        (status = 200, description = "Registered actions", body = [ActionInfo])
    )
)]
pub async fn list_actions(State(state): State<Arc<AppState>>) -> Json<Vec<ActionInfo>> {
    let actions = state
        .dispatcher()
        .registry()
        .specs()
        .iter()
        .map(|spec| ActionInfo {
            name: spec.name().to_string(),
            description: spec.kind.description().to_string(),
            required_params: spec
                .required_params()
                .into_iter()
                .map(String::from)
                .collect(),
            params_schema: serde_json::to_value(&spec.schema).unwrap_or_default(),
        })
        .collect();
    Json(actions)
}

/// Run one action directly and return its result envelope.
#[utoipa::path(
    post,
    path = "/actions/{name}",
    request_body = InvokeActionRequest,
    responses(
        (status = 200, description = "Action result envelope, `{ok: true, data}` or `{ok: false, errorKind, message}`"),
        (status = 404, description = "No such action", body = ErrorResponse)
    ),
    params(
        ("name" = String, Path, description = "Action name, e.g. `calculate`")
    )
)]
pub async fn invoke_action(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<InvokeActionRequest>,
) -> Result<Json<ActionResult>, ApiError> {
    let dispatcher = state.dispatcher();
    if let Lookup::NoHandler = dispatcher.registry().lookup(&name) {
        warn!(action = %name, "Direct invocation of unknown action");
        return Err(ApiError::NotFound(format!("Unknown action: {}", name)));
    }
    let result = dispatcher
        .dispatch(&ActionDirective::new(name, payload.params))
        .await;
    Ok(Json(result))
}

/// Snapshot of the in-process todo list.
#[utoipa::path(
    get,
    path = "/todos",
    responses(
        (status = 200, description = "All todos in creation order", body = TodosResponse)
    )
)]
pub async fn list_todos(State(state): State<Arc<AppState>>) -> Json<TodosResponse> {
    let todos = state.dispatcher().todos().snapshot().await;
    Json(TodosResponse {
        count: todos.len(),
        todos,
    })
}

/// Score a mock-interview transcript.
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Structured feedback with total and per-category scores"),
        (status = 400, description = "Empty transcript", body = ErrorResponse),
        (status = 503, description = "Scoring unavailable", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn generate_feedback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<Feedback>, ApiError> {
    let feedback = state
        .feedback_service
        .generate_feedback(&payload.transcript)
        .await
        .map_err(ApiError::from_feedback)?;
    info!(total_score = feedback.total_score, "Feedback returned");
    Ok(Json(feedback))
}
