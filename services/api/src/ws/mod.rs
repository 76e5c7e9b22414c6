//! WebSocket Chat Sessions
//!
//! One WebSocket connection is one conversation. The history lives in the
//! connection task and is dropped when the socket closes.
//!
//! - `protocol`: the JSON message format exchanged with the client.
//! - `session`: connection lifecycle and the per-message loop.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
