//! Assistant-issued actions.
//!
//! The model may answer a user with a directive instead of prose. This module
//! holds the directive and result types, the registry describing which
//! actions exist, and the dispatcher that validates and runs them.

pub mod calculator;
pub mod dispatcher;
pub mod fetcher;
pub mod registry;
pub mod todo;

use crate::error::ErrorKind;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};

pub use dispatcher::{ActionDispatcher, ActionsConfig};
pub use registry::{ActionKind, ActionRegistry};

/// A parsed request from the model to run an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDirective {
    pub name: String,
    pub params: Map<String, Value>,
}

impl ActionDirective {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// The uniform envelope every action run ends in.
///
/// Serialized as `{"ok":true,"data":{..}}` or
/// `{"ok":false,"errorKind":"..","message":".."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Success { data: Map<String, Value> },
    Failure { error_kind: ErrorKind, message: String },
}

impl ActionResult {
    /// Builds a success envelope from a JSON object. Non-object values are
    /// wrapped under a `value` key.
    pub fn success(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        ActionResult::Success { data }
    }

    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        ActionResult::Failure {
            error_kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            ActionResult::Success { data } => Some(data),
            ActionResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ActionResult::Success { .. } => None,
            ActionResult::Failure { error_kind, .. } => Some(*error_kind),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ActionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActionResult::Success { data } => {
                let mut state = serializer.serialize_struct("ActionResult", 2)?;
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
                state.end()
            }
            ActionResult::Failure {
                error_kind,
                message,
            } => {
                let mut state = serializer.serialize_struct("ActionResult", 3)?;
                state.serialize_field("ok", &false)?;
                state.serialize_field("errorKind", error_kind)?;
                state.serialize_field("message", message)?;
                state.end()
            }
        }
    }
}
