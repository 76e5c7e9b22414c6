//! Cogniview API Library Crate
//!
//! Application state, configuration, REST handlers, WebSocket chat sessions
//! and routing for the assistant service. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support;
