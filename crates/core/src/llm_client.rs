//! Completion Client
//!
//! Drives the language model through an ordered list of endpoints. Each
//! endpoint gets exactly one attempt; the first success wins. When every
//! endpoint fails the client answers with a fixed advisory instead of an
//! error, so a full provider outage never fails the caller's request.

use crate::{
    conversation::ConversationTurn,
    error::{ErrorKind, FetchError},
    prompt::Instructions,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info, warn};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"];
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(20);

/// Hard ceiling applied to any requested `max_tokens`.
pub const MAX_OUTPUT_TOKENS_CEILING: u32 = 2048;
const TOP_P: f32 = 0.95;
const TOP_K: u32 = 40;

/// Returned in place of an empty completion from a healthy endpoint.
pub const EMPTY_COMPLETION_TEXT: &str = "Sorry, I couldn't generate a response.";

/// Canned reply used when no endpoint could serve the request.
pub const FALLBACK_ADVISORY: &str = "I'm having trouble connecting to my AI service right now. \
Here are some things I can help you with:\n\n\
• Interview preparation tips\n\
• Career advice\n\
• Technical questions about programming\n\
• Job search strategies\n\n\
Please try your question again in a moment, or ask me something specific about interview preparation!";

/// Failures reported before any endpoint is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("completion provider is not configured: no API key is set")]
    NotConfigured,
    #[error("conversation history must contain at least one turn")]
    EmptyHistory,
}

impl CompletionError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CompletionError::NotConfigured => Some(ErrorKind::ConfigurationMissing),
            CompletionError::EmptyHistory => None,
        }
    }
}

/// One model variant the client may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub id: String,
}

impl ModelEndpoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Sampling options supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// Who produced a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedBy {
    Endpoint(String),
    /// The client itself, because every endpoint failed.
    Fallback,
}

impl ServedBy {
    pub fn as_str(&self) -> &str {
        match self {
            ServedBy::Endpoint(id) => id,
            ServedBy::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub text: String,
    pub served_by: ServedBy,
}

impl CompletionOutcome {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_ADVISORY.to_string(),
            served_by: ServedBy::Fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.served_by == ServedBy::Fallback
    }
}

/// Log record of a single try against one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAttempt {
    pub endpoint_id: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

// --- Provider wire types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentRequest {
    pub fn new(prompt: &str, options: CompletionOptions) -> Self {
        let temperature = if options.temperature.is_nan() {
            CompletionOptions::default().temperature
        } else {
            options.temperature.clamp(0.0, 1.0)
        };
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: options.max_tokens.min(MAX_OUTPUT_TOKENS_CEILING),
            },
        }
    }
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

/// Sends one generation request to one endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn generate(
        &self,
        endpoint: &ModelEndpoint,
        api_key: &SecretString,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, FetchError>;
}

/// [`CompletionTransport`] for the Gemini `generateContent` REST API.
pub struct GeminiTransport {
    client: reqwest::Client,
    api_base: String,
}

impl GeminiTransport {
    pub fn new(api_base: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cogniview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }
}

#[async_trait]
impl CompletionTransport for GeminiTransport {
    async fn generate(
        &self,
        endpoint: &ModelEndpoint,
        api_key: &SecretString,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, FetchError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            endpoint.id
        );
        let response = self
            .client
            .post(url)
            .query(&[("key", api_key.expose_secret())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Endpoint list, credential and timeout for a [`CompletionClient`].
#[derive(Debug)]
pub struct CompletionConfig {
    pub api_key: Option<SecretString>,
    pub endpoints: Vec<ModelEndpoint>,
    pub endpoint_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoints: DEFAULT_MODELS.iter().map(|m| ModelEndpoint::new(*m)).collect(),
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
        }
    }
}

/// Stateless completion client with ordered endpoint failover.
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    config: CompletionConfig,
    instructions: Instructions,
}

impl CompletionClient {
    pub fn new(
        transport: Arc<dyn CompletionTransport>,
        config: CompletionConfig,
        instructions: Instructions,
    ) -> Self {
        Self {
            transport,
            config,
            instructions,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn endpoints(&self) -> &[ModelEndpoint] {
        &self.config.endpoints
    }

    /// Completes a conversation using the assistant instructions.
    pub async fn complete(
        &self,
        history: &[ConversationTurn],
        options: CompletionOptions,
    ) -> Result<CompletionOutcome, CompletionError> {
        if !self.is_configured() {
            return Err(CompletionError::NotConfigured);
        }
        if history.is_empty() {
            return Err(CompletionError::EmptyHistory);
        }
        let prompt = self.instructions.render(history);
        self.complete_prompt(&prompt, options).await
    }

    /// Sends a fully built prompt through the endpoint list.
    pub async fn complete_prompt(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<CompletionOutcome, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(CompletionError::NotConfigured)?;
        let request = GenerateContentRequest::new(prompt, options);
        let timeout = self.config.endpoint_timeout;

        let mut attempts = Vec::with_capacity(self.config.endpoints.len());
        for endpoint in &self.config.endpoints {
            info!(endpoint = %endpoint.id, "Requesting completion");
            let result =
                tokio::time::timeout(timeout, self.transport.generate(endpoint, api_key, &request))
                    .await;
            let error_message = match result {
                Ok(Ok(response)) => {
                    info!(endpoint = %endpoint.id, "Completion served");
                    let text = response.text().unwrap_or(EMPTY_COMPLETION_TEXT).to_string();
                    return Ok(CompletionOutcome {
                        text,
                        served_by: ServedBy::Endpoint(endpoint.id.clone()),
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {}ms", timeout.as_millis()),
            };
            warn!(endpoint = %endpoint.id, error = %error_message, "Completion endpoint failed");
            attempts.push(EndpointAttempt {
                endpoint_id: endpoint.id.clone(),
                succeeded: false,
                error_message: Some(error_message),
            });
        }

        error!(
            attempts = %summarize(&attempts),
            "All completion endpoints failed; answering with fallback"
        );
        Ok(CompletionOutcome::fallback())
    }
}

fn summarize(attempts: &[EndpointAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                a.endpoint_id,
                a.error_message.as_deref().unwrap_or("ok")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
