//! Action Dispatcher
//!
//! Validates a directive against the registry, runs the matching handler and
//! normalizes every outcome into an [`ActionResult`]. No path out of
//! [`ActionDispatcher::dispatch`] is an error or a panic.

use super::{
    ActionDirective, ActionResult,
    calculator::{self, CalcError},
    fetcher::{JsonFetcher, JsonRequest},
    registry::{
        Action, ActionRegistry, CalculateParams, CreateTodoParams, GetTimeParams, Lookup,
        RepoStatsParams, SearchWebParams, WeatherParams,
    },
    todo::TodoStore,
};
use crate::error::{ErrorKind, FetchError};
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_WEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";

/// Upstream locations and credentials for network-backed actions.
#[derive(Debug)]
pub struct ActionsConfig {
    pub github_api_base: String,
    pub github_token: Option<SecretString>,
    pub weather_api_base: String,
    /// Without a key, `fetch_weather` answers with demo values.
    pub weather_api_key: Option<SecretString>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            github_token: None,
            weather_api_base: DEFAULT_WEATHER_API_BASE.to_string(),
            weather_api_key: None,
        }
    }
}

pub struct ActionDispatcher {
    registry: ActionRegistry,
    todos: Arc<TodoStore>,
    fetcher: Arc<dyn JsonFetcher>,
    config: ActionsConfig,
}

impl ActionDispatcher {
    pub fn new(
        registry: ActionRegistry,
        todos: Arc<TodoStore>,
        fetcher: Arc<dyn JsonFetcher>,
        config: ActionsConfig,
    ) -> Self {
        Self {
            registry,
            todos,
            fetcher,
            config,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn todos(&self) -> &Arc<TodoStore> {
        &self.todos
    }

    pub async fn dispatch(&self, directive: &ActionDirective) -> ActionResult {
        let spec = match self.registry.lookup(&directive.name) {
            Lookup::Handler(spec) => spec,
            Lookup::NoHandler => {
                warn!(action = %directive.name, "Model requested an unknown action");
                return ActionResult::failure(
                    ErrorKind::UnknownAction,
                    format!("Unknown action: {}", directive.name),
                );
            }
        };

        let action = match spec.validate(&directive.params) {
            Ok(action) => action,
            Err(message) => {
                warn!(action = %directive.name, %message, "Rejected action parameters");
                return ActionResult::failure(ErrorKind::InvalidParams, message);
            }
        };

        info!(action = %directive.name, "Executing action");
        let result = match action {
            Action::FetchRepoStats(params) => self.fetch_repo_stats(params).await,
            Action::FetchWeather(params) => self.fetch_weather(params).await,
            Action::CreateTodo(params) => self.create_todo(params).await,
            Action::Calculate(params) => calculate(params),
            Action::GetTime(params) => get_time(params, Utc::now()),
            Action::SearchWeb(params) => search_web(params),
        };

        if let ActionResult::Failure {
            error_kind,
            message,
        } = &result
        {
            warn!(action = %directive.name, %error_kind, %message, "Action failed");
        }
        result
    }

    async fn fetch_repo_stats(&self, params: RepoStatsParams) -> ActionResult {
        let url = format!(
            "{}/repos/{}/{}",
            self.config.github_api_base.trim_end_matches('/'),
            params.owner,
            params.repo
        );
        let mut request = JsonRequest::get(url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.config.github_token {
            request = request.header("Authorization", format!("token {}", token.expose_secret()));
        }

        match self.fetcher.get_json(request).await {
            Ok(data) => ActionResult::success(json!({
                "name": data["name"],
                "description": data["description"],
                "stars": data["stargazers_count"],
                "forks": data["forks_count"],
                "language": data["language"],
                "created": data["created_at"],
                "updated": data["updated_at"],
                "url": data["html_url"],
            })),
            Err(err) => fetch_failure(
                err,
                &format!("Repository {}/{} not found", params.owner, params.repo),
            ),
        }
    }

    async fn fetch_weather(&self, params: WeatherParams) -> ActionResult {
        let Some(api_key) = &self.config.weather_api_key else {
            return ActionResult::success(json!({
                "location": params.location,
                "temperature": "22°C",
                "description": "Clear sky",
                "humidity": "65%",
                "note": "Demo data - configure a weather API key for real data",
            }));
        };

        let url = format!(
            "{}/weather",
            self.config.weather_api_base.trim_end_matches('/')
        );
        let request = JsonRequest::get(url)
            .query("q", params.location.clone())
            .query("units", "metric")
            .query("appid", api_key.expose_secret());

        match self.fetcher.get_json(request).await {
            Ok(data) => match reshape_weather(&data) {
                Some(weather) => ActionResult::success(weather),
                None => ActionResult::failure(
                    ErrorKind::UpstreamError,
                    "Weather provider returned an unexpected payload",
                ),
            },
            Err(err) => fetch_failure(
                err,
                &format!("Weather data for '{}' not found", params.location),
            ),
        }
    }

    async fn create_todo(&self, params: CreateTodoParams) -> ActionResult {
        let (todo, total) = self.todos.append(&params.title).await;
        ActionResult::success(json!({
            "id": todo.id,
            "title": todo.title,
            "completed": todo.completed,
            "createdAt": todo.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "totalTodos": total,
            "message": format!("Todo created: \"{}\"", params.title),
        }))
    }
}

fn fetch_failure(err: FetchError, not_found_message: &str) -> ActionResult {
    let kind = err.kind();
    let message = match kind {
        ErrorKind::UpstreamNotFound => not_found_message.to_string(),
        ErrorKind::TransportError => "Could not reach the upstream service".to_string(),
        _ => "The upstream service returned an error".to_string(),
    };
    warn!(error = %err, "Upstream request failed");
    ActionResult::failure(kind, message)
}

fn reshape_weather(data: &Value) -> Option<Value> {
    let temp = data["main"]["temp"].as_f64()?;
    let mut weather = Map::new();
    weather.insert("location".into(), data["name"].clone());
    weather.insert(
        "temperature".into(),
        json!(format!("{}°C", temp.round() as i64)),
    );
    weather.insert(
        "description".into(),
        data["weather"][0]["description"].clone(),
    );
    if let Some(humidity) = data["main"]["humidity"].as_f64() {
        weather.insert("humidity".into(), json!(format!("{}%", humidity)));
    }
    if let Some(speed) = data["wind"]["speed"].as_f64() {
        weather.insert("windSpeed".into(), json!(format!("{} m/s", speed)));
    }
    Some(Value::Object(weather))
}

fn calculate(params: CalculateParams) -> ActionResult {
    match calculator::evaluate(&params.expression) {
        Ok(value) => ActionResult::success(json!({
            "expression": params.expression,
            "result": value,
            "message": format!("{} = {}", params.expression, calculator::format_number(value)),
        })),
        Err(CalcError::Empty) => ActionResult::failure(
            ErrorKind::InvalidExpression,
            "Expression contains no arithmetic",
        ),
        Err(err) => ActionResult::failure(
            ErrorKind::InvalidExpression,
            format!("Invalid mathematical expression: {}", err),
        ),
    }
}

fn get_time(params: GetTimeParams, now: DateTime<Utc>) -> ActionResult {
    const LOCALIZED: &str = "%A, %B %-d, %Y at %I:%M:%S %p";
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    match params.timezone.parse::<Tz>() {
        Ok(tz) => ActionResult::success(json!({
            "timezone": params.timezone,
            "time": now.with_timezone(&tz).format(LOCALIZED).to_string(),
            "timestamp": timestamp,
        })),
        Err(_) => ActionResult::success(json!({
            "timezone": "UTC",
            "time": now.format(LOCALIZED).to_string(),
            "timestamp": timestamp,
            "note": format!("Unknown timezone '{}', showing UTC", params.timezone),
        })),
    }
}

fn search_web(params: SearchWebParams) -> ActionResult {
    ActionResult::success(json!({
        "query": params.query,
        "results": [],
        "message": "Web search is not connected to a search provider yet",
        "suggestion": "Try a search engine such as DuckDuckGo, Bing or Google directly",
    }))
}
