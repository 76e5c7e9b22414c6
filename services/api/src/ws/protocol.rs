//! Defines the WebSocket message protocol between the browser client and the API server.

use cogniview_core::ExecutedAction;
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A text message from the user to the assistant.
    UserMessage { text: String },
    /// Forgets the conversation held for this connection.
    Reset,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The assistant's reply to the last user message.
    #[serde(rename_all = "camelCase")]
    Response {
        reply: String,
        served_by: String,
        degraded: bool,
    },
    /// An action the assistant ran while answering; sent before `Response`.
    ActionResult(ExecutedAction),
    /// A non-fatal problem with the last client message.
    Error { message: String },
}
