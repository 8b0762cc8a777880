use crate::constants::{defaults, network};
use crate::errors::ToolError;
use crate::utils::paths::resolve_credentials_path;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// A group of tools that share one upstream and one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Tasks,
    Weather,
    Calendar,
    Graphql,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 4] = [
        ToolGroup::Tasks,
        ToolGroup::Weather,
        ToolGroup::Calendar,
        ToolGroup::Graphql,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolGroup::Tasks => "tasks",
            ToolGroup::Weather => "weather",
            ToolGroup::Calendar => "calendar",
            ToolGroup::Graphql => "graphql",
        }
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolGroup {
    type Err = ToolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "tasks" | "task" => Ok(ToolGroup::Tasks),
            "weather" => Ok(ToolGroup::Weather),
            "calendar" => Ok(ToolGroup::Calendar),
            "graphql" => Ok(ToolGroup::Graphql),
            other => Err(ToolError::config(format!(
                "Unknown template '{}' in RELAY_TEMPLATES",
                other
            ))
            .with_hint("Use a comma list of: tasks, weather, calendar, graphql.")),
        }
    }
}

/// Static process configuration. Resolved once before the first dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub tasks_base_url: String,
    pub calendar_base_url: String,
    pub graphql_endpoint: String,
    pub weather_base_url: String,
    #[serde(serialize_with = "redact_secret")]
    pub weather_api_key: Option<String>,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub max_requests_per_minute: u32,
    pub max_response_chars: usize,
    pub templates: Vec<ToolGroup>,
    pub credentials_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_base_url: defaults::TASKS_BASE_URL.to_string(),
            calendar_base_url: defaults::CALENDAR_BASE_URL.to_string(),
            graphql_endpoint: defaults::GRAPHQL_ENDPOINT.to_string(),
            weather_base_url: defaults::WEATHER_BASE_URL.to_string(),
            weather_api_key: None,
            timeout: Duration::from_secs(network::DEFAULT_TIMEOUT_SECS),
            max_requests_per_minute: defaults::MAX_REQUESTS_PER_MINUTE,
            max_response_chars: defaults::MAX_RESPONSE_CHARS,
            templates: ToolGroup::ALL.to_vec(),
            credentials_path: PathBuf::from("credentials.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the record from an arbitrary key lookup so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let base = Config::default();

        let timeout_secs = parse_number::<u64>("API_TIMEOUT", read("API_TIMEOUT"))?
            .unwrap_or(network::DEFAULT_TIMEOUT_SECS);
        let templates = match read("RELAY_TEMPLATES") {
            Some(raw) => parse_templates(&raw)?,
            None => base.templates.clone(),
        };

        let config = Self {
            tasks_base_url: read("API_BASE_URL").unwrap_or(base.tasks_base_url),
            calendar_base_url: read("GOOGLE_CALENDAR_BASE_URL").unwrap_or(base.calendar_base_url),
            graphql_endpoint: read("GRAPHQL_ENDPOINT").unwrap_or(base.graphql_endpoint),
            weather_base_url: read("WEATHER_API_BASE_URL").unwrap_or(base.weather_base_url),
            weather_api_key: read("OPENWEATHER_API_KEY"),
            timeout: Duration::from_secs(timeout_secs),
            max_requests_per_minute: parse_number(
                "MAX_REQUESTS_PER_MINUTE",
                read("MAX_REQUESTS_PER_MINUTE"),
            )?
            .unwrap_or(base.max_requests_per_minute),
            max_response_chars: parse_number("MAX_RESPONSE_CHARS", read("MAX_RESPONSE_CHARS"))?
                .unwrap_or(base.max_response_chars),
            templates,
            credentials_path: read("RELAY_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(resolve_credentials_path),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        ensure_http_url("API_BASE_URL", &self.tasks_base_url)?;
        ensure_http_url("GOOGLE_CALENDAR_BASE_URL", &self.calendar_base_url)?;
        ensure_http_url("GRAPHQL_ENDPOINT", &self.graphql_endpoint)?;
        ensure_http_url("WEATHER_API_BASE_URL", &self.weather_base_url)?;
        if self.timeout.is_zero() {
            return Err(ToolError::config("API_TIMEOUT must be greater than zero"));
        }
        if self.templates.is_empty() {
            return Err(ToolError::config("RELAY_TEMPLATES must enable at least one template"));
        }
        Ok(())
    }

    pub fn is_enabled(&self, group: ToolGroup) -> bool {
        self.templates.contains(&group)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, ToolError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ToolError::config(format!("{} must be a non-negative integer", key))),
    }
}

fn parse_templates(raw: &str) -> Result<Vec<ToolGroup>, ToolError> {
    let mut out = Vec::new();
    for part in raw.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let group = part.parse::<ToolGroup>()?;
        if !out.contains(&group) {
            out.push(group);
        }
    }
    Ok(out)
}

fn ensure_http_url(key: &str, raw: &str) -> Result<(), ToolError> {
    let parsed = Url::parse(raw)
        .map_err(|_| ToolError::config(format!("{} must be an absolute URL", key)))?;
    if !network::ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(ToolError::config(format!(
            "{} must be a valid HTTP(S) URL",
            key
        )));
    }
    Ok(())
}

fn redact_secret<S: serde::Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => s.serialize_str("***"),
        None => s.serialize_none(),
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = Config::from_lookup(lookup(&[("RELAY_CREDENTIALS_PATH", "/tmp/c.json")]))
            .expect("config");
        assert_eq!(config.tasks_base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_response_chars, 8_000);
        assert_eq!(config.templates, ToolGroup::ALL.to_vec());
        assert!(config.weather_api_key.is_none());
    }

    #[test]
    fn templates_are_parsed_and_deduplicated() {
        let config = Config::from_lookup(lookup(&[
            ("RELAY_TEMPLATES", "tasks, weather,tasks"),
            ("RELAY_CREDENTIALS_PATH", "/tmp/c.json"),
        ]))
        .expect("config");
        assert_eq!(config.templates, vec![ToolGroup::Tasks, ToolGroup::Weather]);
        assert!(!config.is_enabled(ToolGroup::Calendar));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = Config::from_lookup(lookup(&[("GRAPHQL_ENDPOINT", "ftp://example.com/graphql")]))
            .expect_err("must fail");
        assert!(err.message.contains("GRAPHQL_ENDPOINT"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        let err = Config::from_lookup(lookup(&[("API_TIMEOUT", "soon")])).expect_err("must fail");
        assert!(err.message.contains("API_TIMEOUT"));
    }

    #[test]
    fn serialized_config_redacts_api_key() {
        let config = Config {
            weather_api_key: Some("secret".to_string()),
            ..Config::default()
        };
        let value = serde_json::to_value(&config).expect("serialize");
        assert_eq!(value["weather_api_key"], "***");
        assert_eq!(value["timeout"], 30);
    }
}
