//! Decides whether a completion is conversational text or an action directive.
//!
//! A directive is only recognized when the whole trimmed output is a single
//! JSON object of the form `{"type":"action","action":"..","params":{..}}`.
//! Prose that merely contains JSON is always treated as text.

use crate::actions::ActionDirective;
use serde_json::{Map, Value};
use tracing::debug;

/// The two possible readings of a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Text(String),
    Action(ActionDirective),
}

pub fn parse(raw: &str) -> ParsedResponse {
    match directive_from(raw.trim()) {
        Some(directive) => ParsedResponse::Action(directive),
        None => ParsedResponse::Text(raw.to_string()),
    }
}

fn directive_from(trimmed: &str) -> Option<ActionDirective> {
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            debug!(error_kind = "parse_ambiguous", error = %e, "Output looks like JSON but does not parse");
            return None;
        }
    };

    let object = value.as_object()?;
    if object.get("type").and_then(Value::as_str) != Some("action") {
        return None;
    }
    let name = match object.get("action").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name,
        _ => {
            debug!(error_kind = "parse_ambiguous", "Action object without an action name");
            return None;
        }
    };
    let params = match object.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            debug!(error_kind = "parse_ambiguous", "Action params are not an object");
            return None;
        }
    };
    Some(ActionDirective::new(name, params))
}
