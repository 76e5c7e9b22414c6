//! In-process fakes for exercising handlers without network access.

use crate::state::AppState;
use async_trait::async_trait;
use cogniview_core::{
    ActionDispatcher, ActionRegistry, ActionsConfig, Assistant, CompletionClient,
    CompletionConfig, FetchError,
    actions::{
        fetcher::{JsonFetcher, JsonRequest},
        todo::TodoStore,
    },
    feedback::MockFeedbackService,
    llm_client::{
        Candidate, CompletionTransport, Content, GenerateContentRequest, GenerateContentResponse,
        ModelEndpoint, Part,
    },
    prompt::Instructions,
};
use secrecy::SecretString;
use serde_json::Value;
use std::{collections::VecDeque, sync::Arc, sync::Mutex, time::Duration};

/// Replays canned responses in order; fails once the script runs out.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<GenerateContentResponse, FetchError>>>,
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn generate(
        &self,
        _endpoint: &ModelEndpoint,
        _api_key: &SecretString,
        _request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, FetchError> {
        let next = self.replies.lock().map(|mut q| q.pop_front());
        match next {
            Ok(Some(reply)) => reply,
            _ => Err(FetchError::Transport("script exhausted".into())),
        }
    }
}

/// Upstream that is never reachable.
pub struct OfflineFetcher;

#[async_trait]
impl JsonFetcher for OfflineFetcher {
    async fn get_json(&self, _request: JsonRequest) -> Result<Value, FetchError> {
        Err(FetchError::Transport("offline".into()))
    }
}

pub fn reply(text: &str) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            }),
        }],
    }
}

pub fn test_state(
    api_key: Option<&str>,
    replies: Vec<Result<GenerateContentResponse, FetchError>>,
) -> AppState {
    let transport = ScriptedTransport {
        replies: Mutex::new(replies.into()),
    };
    let completion = CompletionClient::new(
        Arc::new(transport),
        CompletionConfig {
            api_key: api_key.map(|k| SecretString::from(k.to_string())),
            endpoints: vec![ModelEndpoint::new("model-a")],
            endpoint_timeout: Duration::from_secs(5),
        },
        Instructions::default(),
    );
    let dispatcher = ActionDispatcher::new(
        ActionRegistry::new(),
        Arc::new(TodoStore::new()),
        Arc::new(OfflineFetcher),
        ActionsConfig::default(),
    );
    let assistant = Assistant::new(Arc::new(completion), Arc::new(dispatcher));
    AppState::new(Arc::new(assistant), Arc::new(MockFeedbackService))
}
