//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared service
//! handles every request needs.

use cogniview_core::{
    assistant::Assistant, feedback::FeedbackService, llm_client::CompletionClient,
    ActionDispatcher,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub feedback_service: Arc<dyn FeedbackService>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, feedback_service: Arc<dyn FeedbackService>) -> Self {
        Self {
            assistant,
            feedback_service,
        }
    }

    pub fn completion(&self) -> &Arc<CompletionClient> {
        self.assistant.completion()
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        self.assistant.dispatcher()
    }
}
