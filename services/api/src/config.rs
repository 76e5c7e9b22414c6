use cogniview_core::{
    actions::dispatcher::{DEFAULT_GITHUB_API_BASE, DEFAULT_WEATHER_API_BASE},
    llm_client::{DEFAULT_GEMINI_API_BASE, DEFAULT_MODELS},
};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Absent keys are reported per request, not at startup.
    pub gemini_api_key: Option<SecretString>,
    pub gemini_api_base: String,
    pub completion_models: Vec<String>,
    pub endpoint_timeout: Duration,
    pub github_api_base: String,
    pub github_token: Option<SecretString>,
    pub openweather_api_base: String,
    pub openweather_api_key: Option<SecretString>,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = secret_var("GEMINI_API_KEY");
        let gemini_api_base = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string());

        let completion_models = match std::env::var("COMPLETION_MODELS") {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect::<Vec<_>>(),
            Err(_) => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        };
        if completion_models.is_empty() {
            return Err(ConfigError::InvalidValue(
                "COMPLETION_MODELS".to_string(),
                "at least one model is required".to_string(),
            ));
        }

        let timeout_str = std::env::var("ENDPOINT_TIMEOUT_SECS").unwrap_or_else(|_| "20".to_string());
        let endpoint_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "ENDPOINT_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ));
            }
        };

        let github_api_base = std::env::var("GITHUB_API_BASE")
            .unwrap_or_else(|_| DEFAULT_GITHUB_API_BASE.to_string());
        let github_token = secret_var("GITHUB_TOKEN");
        let openweather_api_base = std::env::var("OPENWEATHER_API_BASE")
            .unwrap_or_else(|_| DEFAULT_WEATHER_API_BASE.to_string());
        let openweather_api_key = secret_var("OPENWEATHER_API_KEY");

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            bind_address,
            gemini_api_key,
            gemini_api_base,
            completion_models,
            endpoint_timeout,
            github_api_base,
            github_token,
            openweather_api_base,
            openweather_api_key,
            log_level,
            prompts_path,
        })
    }
}

/// Reads an optional secret; an empty value counts as unset.
fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const VARS: [&str; 11] = [
        "BIND_ADDRESS",
        "GEMINI_API_KEY",
        "GEMINI_API_BASE",
        "COMPLETION_MODELS",
        "ENDPOINT_TIMEOUT_SECS",
        "GITHUB_API_BASE",
        "GITHUB_TOKEN",
        "OPENWEATHER_API_BASE",
        "OPENWEATHER_API_KEY",
        "RUST_LOG",
        "PROMPTS_PATH",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults_without_any_keys() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load without credentials");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_api_base, DEFAULT_GEMINI_API_BASE);
        assert_eq!(
            config.completion_models,
            vec!["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"]
        );
        assert_eq!(config.endpoint_timeout, Duration::from_secs(20));
        assert_eq!(config.github_api_base, "https://api.github.com");
        assert!(config.github_token.is_none());
        assert!(config.openweather_api_key.is_none());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("COMPLETION_MODELS", " model-a , model-b,, ");
            env::set_var("ENDPOINT_TIMEOUT_SECS", "5");
            env::set_var("GITHUB_TOKEN", "gh-token");
            env::set_var("OPENWEATHER_API_KEY", "");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.gemini_api_key.as_ref().map(|k| k.expose_secret()),
            Some("test-gemini-key")
        );
        assert_eq!(config.completion_models, vec!["model-a", "model-b"]);
        assert_eq!(config.endpoint_timeout, Duration::from_secs(5));
        assert!(config.github_token.is_some());
        assert!(config.openweather_api_key.is_none());
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        for (var, value) in [
            ("BIND_ADDRESS", "not-a-valid-address"),
            ("RUST_LOG", "not-a-level"),
            ("ENDPOINT_TIMEOUT_SECS", "0"),
            ("ENDPOINT_TIMEOUT_SECS", "soon"),
            ("COMPLETION_MODELS", " , "),
        ] {
            clear_env_vars();
            unsafe {
                env::set_var(var, value);
            }
            match Config::from_env().unwrap_err() {
                ConfigError::InvalidValue(name, _) => assert_eq!(name, var),
            }
        }
        clear_env_vars();
    }
}
