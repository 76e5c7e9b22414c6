//! Core of the Cogniview assistant: completion failover, action protocol,
//! action execution, conversation orchestration, interview scoring and the
//! voice session state machine. Everything here is transport-agnostic; the
//! HTTP and WebSocket surface lives in the `cogniview-api` service.

pub mod actions;
pub mod assistant;
pub mod conversation;
pub mod error;
pub mod feedback;
pub mod llm_client;
pub mod prompt;
pub mod response_parser;
pub mod voice;

pub use actions::{ActionDirective, ActionDispatcher, ActionRegistry, ActionResult, ActionsConfig};
pub use assistant::{Assistant, Exchange, ExecutedAction};
pub use conversation::{ConversationTurn, Role};
pub use error::{ErrorKind, FetchError};
pub use llm_client::{
    CompletionClient, CompletionConfig, CompletionError, CompletionOptions, CompletionOutcome,
    ServedBy,
};
pub use voice::{VoiceError, VoiceSession, VoiceSessionState};
