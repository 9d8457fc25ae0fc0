//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the upstream API key.
pub const ENV_API_KEY: &str = "VECTARA_API_KEY";
/// Environment variable overriding the upstream base URL.
pub const ENV_BASE_URL: &str = "VECTARA_BASE_URL";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;
    finalize(config, |name| std::env::var(name).ok())
}

/// Default configuration with environment overrides applied.
pub fn load_from_env() -> Result<ServerConfig, ConfigError> {
    finalize(ServerConfig::default(), |name| std::env::var(name).ok())
}

/// Apply overrides from `env` and validate.
pub fn finalize<F>(mut config: ServerConfig, env: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = env(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
        config.upstream.api_key = Some(key.trim().to_string());
    }
    if let Some(url) = env(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
        config.upstream.base_url = url.trim().trim_end_matches('/').to_string();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let config = finalize(ServerConfig::default(), |name| match name {
            ENV_API_KEY => Some(" secret-key ".to_string()),
            ENV_BASE_URL => Some("http://127.0.0.1:9999/".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.upstream.api_key.as_deref(), Some("secret-key"));
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_validation_error_surfaces() {
        let mut config = ServerConfig::default();
        config.retries.max_attempts = 0;

        let err = finalize(config, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("retries.max_attempts"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("vectara-mcp-config-{}.toml", std::process::id()));
        fs::write(&path, "[retries]\nmax_attempts = 4\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.retries.max_attempts, 4);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
