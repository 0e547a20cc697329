//! Service configuration from environment variables

use std::path::PathBuf;

/// Environment-derived service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding one trained artifact set
    pub artifact_dir: PathBuf,
    /// Normalization rules TOML; the built-in survey rules when unset
    pub rules_path: Option<PathBuf>,
    /// JSON array of column names overriding the served schema during
    /// partial dataset migrations
    pub schema_override: Option<PathBuf>,
    pub port: u16,
    /// Requests must present this key in `x-api-key` when set
    pub api_key: Option<String>,
    /// CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models"),
            rules_path: None,
            schema_override: None,
            port: 8080,
            api_key: None,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            artifact_dir: env_path("TRIAGE_ARTIFACT_DIR").unwrap_or(defaults.artifact_dir),
            rules_path: env_path("TRIAGE_RULES"),
            schema_override: env_path("TRIAGE_SCHEMA_OVERRIDE"),
            port: env_var("TRIAGE_PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            api_key: env_var("TRIAGE_API_KEY"),
            allowed_origins: env_var("TRIAGE_ALLOWED_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_var(key).map(PathBuf::from)
}
