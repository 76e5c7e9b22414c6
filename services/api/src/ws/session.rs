//! Manages the WebSocket connection lifecycle for a chat session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use cogniview_core::{CompletionOptions, ConversationTurn};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection.");

    let (mut socket_tx, socket_rx) = socket.split();
    if let Err(e) = run_chat_session(&state, &mut socket_tx, socket_rx).await {
        error!(error = ?e, "Chat session terminated with error.");
    }
    info!("WebSocket connection closed.");
}

/// The main event loop for an active WebSocket session.
///
/// Messages are answered one at a time, in arrival order, so the history
/// always reflects a single linear conversation.
async fn run_chat_session(
    state: &AppState,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let mut history: Vec<ConversationTurn> = Vec::new();

    while let Some(msg_result) = socket_rx.next().await {
        let text = match msg_result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame; this endpoint only speaks JSON text.");
                continue;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        };

        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Unrecognized client message");
                send_msg(
                    socket_tx,
                    ServerMessage::Error {
                        message: format!("Unrecognized message: {}", e),
                    },
                )
                .await?;
                continue;
            }
        };

        match client_msg {
            ClientMessage::Reset => {
                history.clear();
                info!("Conversation reset by client.");
            }
            ClientMessage::UserMessage { text } => {
                for reply in answer(state, &mut history, &text).await {
                    send_msg(socket_tx, reply).await?;
                }
            }
        }
    }
    Ok(())
}

/// Runs one user message through the assistant and returns the frames to
/// send back. On failure the history is left untouched.
async fn answer(
    state: &AppState,
    history: &mut Vec<ConversationTurn>,
    text: &str,
) -> Vec<ServerMessage> {
    if text.trim().is_empty() {
        return vec![ServerMessage::Error {
            message: "message must not be empty".to_string(),
        }];
    }
    match state
        .assistant
        .handle_user_message(history, text, CompletionOptions::default())
        .await
    {
        Ok(exchange) => {
            let mut frames = Vec::with_capacity(2);
            let degraded = exchange.is_degraded();
            if let Some(action) = exchange.action {
                frames.push(ServerMessage::ActionResult(action));
            }
            frames.push(ServerMessage::Response {
                reply: exchange.reply,
                served_by: exchange.served_by.as_str().to_string(),
                degraded,
            });
            *history = exchange.history;
            frames
        }
        Err(e) => {
            warn!(error = %e, "Assistant refused the message");
            vec![ServerMessage::Error {
                message: e.to_string(),
            }]
        }
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
