//! API Models
//!
//! Request and response bodies of the REST API, annotated for OpenAPI
//! generation with `utoipa`. Core types travel as-is and are documented as
//! free-form objects.

use cogniview_core::{
    ConversationTurn, ExecutedAction, actions::todo::Todo, feedback::TranscriptEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Prior turns of the conversation, oldest first.
    #[serde(default)]
    #[schema(value_type = Vec<Object>, example = json!([{"role": "user", "text": "Hi"}, {"role": "assistant", "text": "Hello!"}]))]
    pub history: Vec<ConversationTurn>,
    #[schema(example = "What is 15 times 23?")]
    pub message: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<ConversationTurn>,
    #[schema(example = "gemini-2.5-flash")]
    pub served_by: String,
    /// True when every completion endpoint failed and the reply is the advisory.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub action: Option<ExecutedAction>,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ConversationTurn>,
    #[schema(example = 1000)]
    pub max_tokens: Option<u32>,
    #[schema(example = 0.7)]
    pub temperature: Option<f32>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub output: String,
    /// Endpoint that served the completion, or `fallback`.
    pub model: String,
    pub is_fallback: bool,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    #[schema(example = "fetch_weather")]
    pub name: String,
    pub description: String,
    pub required_params: Vec<String>,
    /// JSON schema of the parameter object.
    #[schema(value_type = Object)]
    pub params_schema: Value,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct InvokeActionRequest {
    #[serde(default)]
    #[schema(value_type = Object, example = json!({"location": "Lisbon"}))]
    pub params: Map<String, Value>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TodosResponse {
    #[schema(value_type = Vec<Object>)]
    pub todos: Vec<Todo>,
    pub count: usize,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct FeedbackRequest {
    #[schema(value_type = Vec<Object>, example = json!([{"role": "interviewer", "content": "Tell me about yourself."}]))]
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "configuration_missing")]
    pub error_kind: Option<String>,
}
