//! Reading and writing the configuration file
//!
//! Files are JSON. Before parsing, `${VAR}` and `${VAR:-default}` references
//! are replaced from the environment so keys never have to live on disk.

use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

impl Config {
    /// Parse and validate configuration text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let content = expand_env_vars(content)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path`; a missing file is an error
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                path
            )));
        }
        info!("Loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    /// Load the file at `path`, or fall back to defaults when it does not exist
    pub async fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path).await
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        info!("Config saved to {:?}", path);
        Ok(())
    }
}

/// Replace `${VAR}` and `${VAR:-default}` with environment values
pub fn expand_env_vars(content: &str) -> ConfigResult<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_expr = var_expr.as_str();

        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        let replacement = match (std::env::var(var_name), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
        };

        result = result.replace(full_match.as_str(), &replacement);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        assert!(Config::load(&path).await.is_err());
        let config = Config::load_or_default(&path).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.llm.model = "gpt-4o".to_string();
        config.agent.max_rounds = 3;
        config.save(&path).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.llm.model, "gpt-4o");
        assert_eq!(loaded.agent.max_rounds, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_json_str(r#"{"agent": {"max_rounds": 2}}"#).unwrap();
        assert_eq!(config.agent.max_rounds, 2);
        assert_eq!(config.agent.event_buffer, 32);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_json_str(r#"{"agent": {"retry": {"max_attempts": 0}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        assert!(matches!(
            Config::from_json_str("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("PARLEY_TEST_MODEL", "gpt-test");

        let expanded = expand_env_vars(r#"{"model": "${PARLEY_TEST_MODEL}"}"#).unwrap();
        assert!(expanded.contains("gpt-test"));

        let defaulted = expand_env_vars(r#"{"model": "${PARLEY_TEST_UNSET:-fallback}"}"#).unwrap();
        assert!(defaulted.contains("fallback"));

        assert!(matches!(
            expand_env_vars("${PARLEY_TEST_UNSET}"),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }
}
