//! Error taxonomy shared by the completion client and the action dispatcher.
//!
//! Failures from remote providers are converted into these typed values at
//! the boundary where they occur and never escape as panics.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable, machine-readable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationMissing,
    TransportError,
    UpstreamError,
    UpstreamNotFound,
    InvalidParams,
    UnknownAction,
    InvalidExpression,
    ParseAmbiguous,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationMissing => "configuration_missing",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::UpstreamNotFound => "upstream_not_found",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::UnknownAction => "unknown_action",
            ErrorKind::InvalidExpression => "invalid_expression",
            ErrorKind::ParseAmbiguous => "parse_ambiguous",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures from an outbound HTTP call made on behalf of an action or a
/// completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream answered with a non-2xx status.
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Timeout, DNS failure, connection reset and the like.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A 2xx response whose body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Maps the failure onto the dispatcher's taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Status { status: 404, .. } => ErrorKind::UpstreamNotFound,
            FetchError::Status { .. } | FetchError::Decode(_) => ErrorKind::UpstreamError,
            FetchError::Transport(_) => ErrorKind::TransportError,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_names_match_display() {
        for kind in [
            ErrorKind::ConfigurationMissing,
            ErrorKind::TransportError,
            ErrorKind::UpstreamError,
            ErrorKind::UpstreamNotFound,
            ErrorKind::InvalidParams,
            ErrorKind::UnknownAction,
            ErrorKind::InvalidExpression,
            ErrorKind::ParseAmbiguous,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_fetch_error_classification() {
        let not_found = FetchError::Status {
            status: 404,
            body: String::new(),
        };
        assert_eq!(not_found.kind(), ErrorKind::UpstreamNotFound);

        let server = FetchError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(server.kind(), ErrorKind::UpstreamError);

        assert_eq!(
            FetchError::Transport("dns".into()).kind(),
            ErrorKind::TransportError
        );
        assert_eq!(
            FetchError::Decode("eof".into()).kind(),
            ErrorKind::UpstreamError
        );
    }
}
