//! Assistant Orchestrator
//!
//! Glues the completion client, the response parser and the action dispatcher
//! into one user-message round trip. A completion that asks for an action
//! gets exactly one follow-up completion to summarize the result; whatever
//! that follow-up says is the reply, even if it looks like another directive.

use crate::{
    actions::{ActionDirective, ActionDispatcher, ActionResult},
    conversation::ConversationTurn,
    llm_client::{CompletionClient, CompletionError, CompletionOptions, ServedBy},
    response_parser::{self, ParsedResponse},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// The action executed while answering a message, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedAction {
    pub name: String,
    pub result: ActionResult,
}

/// Result of handling one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub reply: String,
    /// The input history plus every turn added while answering.
    pub history: Vec<ConversationTurn>,
    /// Who produced the final reply.
    pub served_by: ServedBy,
    pub action: Option<ExecutedAction>,
}

impl Exchange {
    pub fn is_degraded(&self) -> bool {
        self.served_by == ServedBy::Fallback
    }
}

pub struct Assistant {
    completion: Arc<CompletionClient>,
    dispatcher: Arc<ActionDispatcher>,
}

impl Assistant {
    pub fn new(completion: Arc<CompletionClient>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            completion,
            dispatcher,
        }
    }

    pub fn completion(&self) -> &Arc<CompletionClient> {
        &self.completion
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    /// Answers `text` in the context of `history`.
    ///
    /// The caller's history is never mutated; the extended copy comes back in
    /// the [`Exchange`]. Errors only when the completion client refuses the
    /// request outright (missing credential).
    #[instrument(skip_all, fields(history_len = history.len()))]
    pub async fn handle_user_message(
        &self,
        history: &[ConversationTurn],
        text: &str,
        options: CompletionOptions,
    ) -> Result<Exchange, CompletionError> {
        let mut history = history.to_vec();
        history.push(ConversationTurn::user(text));

        let first = self.completion.complete(&history, options).await?;
        let directive = match response_parser::parse(&first.text) {
            ParsedResponse::Text(reply) => {
                history.push(ConversationTurn::assistant(reply.clone()));
                return Ok(Exchange {
                    reply,
                    history,
                    served_by: first.served_by,
                    action: None,
                });
            }
            ParsedResponse::Action(directive) => directive,
        };

        let result = self.run_action(&directive).await;
        history.push(ConversationTurn::system(result.to_json().to_string()));

        let summary = self.completion.complete(&history, options).await?;
        history.push(ConversationTurn::assistant(summary.text.clone()));
        Ok(Exchange {
            reply: summary.text,
            history,
            served_by: summary.served_by,
            action: Some(ExecutedAction {
                name: directive.name,
                result,
            }),
        })
    }

    async fn run_action(&self, directive: &ActionDirective) -> ActionResult {
        info!(action = %directive.name, "Model requested an action");
        let result = self.dispatcher.dispatch(directive).await;
        info!(action = %directive.name, ok = result.is_ok(), "Action finished");
        result
    }
}
