//! Action Registry
//!
//! The fixed table of actions the assistant may request. Each entry declares
//! its parameters explicitly so directives can be validated into a typed
//! [`Action`] before any handler runs. The table is built once and never
//! mutated afterwards.

use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every action the dispatcher knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    FetchRepoStats,
    FetchWeather,
    CreateTodo,
    Calculate,
    GetTime,
    SearchWeb,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::FetchRepoStats,
        ActionKind::FetchWeather,
        ActionKind::CreateTodo,
        ActionKind::Calculate,
        ActionKind::GetTime,
        ActionKind::SearchWeb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::FetchRepoStats => "fetch_repo_stats",
            ActionKind::FetchWeather => "fetch_weather",
            ActionKind::CreateTodo => "create_todo",
            ActionKind::Calculate => "calculate",
            ActionKind::GetTime => "get_time",
            ActionKind::SearchWeb => "search_web",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionKind::FetchRepoStats => "Look up stars, forks and language of a GitHub repository",
            ActionKind::FetchWeather => "Current weather for a location",
            ActionKind::CreateTodo => "Add an item to the user's todo list",
            ActionKind::Calculate => "Evaluate an arithmetic expression",
            ActionKind::GetTime => "Current time in a timezone",
            ActionKind::SearchWeb => "Search the web",
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            ActionKind::FetchRepoStats => const {
                &[ParamSpec::required("owner"), ParamSpec::required("repo")]
            },
            ActionKind::FetchWeather => const { &[ParamSpec::required("location")] },
            ActionKind::CreateTodo => const { &[ParamSpec::required("title")] },
            ActionKind::Calculate => const { &[ParamSpec::required("expression")] },
            ActionKind::GetTime => const { &[ParamSpec::defaulted("timezone", "UTC")] },
            ActionKind::SearchWeb => const { &[ParamSpec::required("query")] },
        }
    }

    fn schema(&self) -> Schema {
        match self {
            ActionKind::FetchRepoStats => schema_for!(RepoStatsParams),
            ActionKind::FetchWeather => schema_for!(WeatherParams),
            ActionKind::CreateTodo => schema_for!(CreateTodoParams),
            ActionKind::Calculate => schema_for!(CalculateParams),
            ActionKind::GetTime => schema_for!(GetTimeParams),
            ActionKind::SearchWeb => schema_for!(SearchWebParams),
        }
    }
}

/// A single string parameter of an action.
///
/// Required parameters must be present and non-blank. Parameters with a
/// default take it when missing or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    const fn required(name: &'static str) -> Self {
        Self { name, default: None }
    }

    const fn defaulted(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepoStatsParams {
    /// Account or organisation that owns the repository.
    pub owner: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeatherParams {
    /// City name, optionally with a country code (e.g. "Paris,FR").
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateTodoParams {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalculateParams {
    /// Arithmetic using digits, `+ - * / . ( )` and spaces.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetTimeParams {
    /// IANA timezone name, defaults to UTC.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchWebParams {
    pub query: String,
}

/// A directive whose parameters have been checked against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchRepoStats(RepoStatsParams),
    FetchWeather(WeatherParams),
    CreateTodo(CreateTodoParams),
    Calculate(CalculateParams),
    GetTime(GetTimeParams),
    SearchWeb(SearchWebParams),
}

/// Registry entry for one action.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub schema: Schema,
}

impl ActionSpec {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Names of parameters that must be supplied by the model.
    pub fn required_params(&self) -> Vec<&'static str> {
        self.kind
            .params()
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name)
            .collect()
    }

    /// Checks raw parameters and converts them into a typed [`Action`].
    ///
    /// Unknown extra parameters are ignored. The error string is suitable
    /// for returning to the model.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<Action, String> {
        let mut normalized = Map::new();
        for spec in self.kind.params() {
            let value = match params.get(spec.name) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => return Err(format!("Parameter '{}' must be a string", spec.name)),
            };
            let value = match (value, spec.default) {
                (Some(v), _) => v,
                (None, Some(default)) => default.to_string(),
                (None, None) => {
                    return Err(format!(
                        "Parameter '{}' is required and must not be empty",
                        spec.name
                    ));
                }
            };
            normalized.insert(spec.name.to_string(), Value::String(value));
        }

        let normalized = Value::Object(normalized);
        let typed = match self.kind {
            ActionKind::FetchRepoStats => serde_json::from_value(normalized).map(Action::FetchRepoStats),
            ActionKind::FetchWeather => serde_json::from_value(normalized).map(Action::FetchWeather),
            ActionKind::CreateTodo => serde_json::from_value(normalized).map(Action::CreateTodo),
            ActionKind::Calculate => serde_json::from_value(normalized).map(Action::Calculate),
            ActionKind::GetTime => serde_json::from_value(normalized).map(Action::GetTime),
            ActionKind::SearchWeb => serde_json::from_value(normalized).map(Action::SearchWeb),
        };
        let action =
            typed.map_err(|e| format!("Invalid parameters for '{}': {}", self.name(), e))?;
        if let Action::FetchRepoStats(params) = &action {
            check_github_name("owner", &params.owner)?;
            check_github_name("repo", &params.repo)?;
        }
        Ok(action)
    }

    /// Example parameter object used in the model instructions, e.g.
    /// `{"owner":"string","repo":"string"}`.
    pub fn params_example(&self) -> String {
        let example: Map<String, Value> = self
            .kind
            .params()
            .iter()
            .map(|p| (p.name.to_string(), Value::String("string".to_string())))
            .collect();
        Value::Object(example).to_string()
    }
}

/// GitHub account and repository names are limited to ASCII letters, digits,
/// `.`, `-` and `_`. Anything else, and the dot segments, could steer the
/// request to a different API path.
fn check_github_name(param: &str, value: &str) -> Result<(), String> {
    let charset_ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !charset_ok || value == "." || value == ".." {
        return Err(format!(
            "Parameter '{}' is not a valid GitHub name: '{}'",
            param, value
        ));
    }
    Ok(())
}

/// Result of looking an action up by name.
#[derive(Debug)]
pub enum Lookup<'a> {
    Handler(&'a ActionSpec),
    NoHandler,
}

/// Immutable table of supported actions, keyed by exact name.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    entries: Vec<ActionSpec>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        let entries = ActionKind::ALL
            .iter()
            .map(|kind| ActionSpec {
                kind: *kind,
                schema: kind.schema(),
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        match self.entries.iter().find(|e| e.name() == name) {
            Some(spec) => Lookup::Handler(spec),
            None => Lookup::NoHandler,
        }
    }

    pub fn specs(&self) -> &[ActionSpec] {
        &self.entries
    }

    /// Renders the action list embedded in the model instructions.
    pub fn describe_for_prompt(&self) -> String {
        self.entries
            .iter()
            .map(|spec| {
                format!(
                    "- {}: {} ({})",
                    spec.name(),
                    spec.params_example(),
                    spec.kind.description()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
