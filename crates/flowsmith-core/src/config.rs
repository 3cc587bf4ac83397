use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowsmithError, Result};

/// Top-level Flowsmith configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Remote execution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_execute_path")]
    pub execute_path: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            execute_path: default_execute_path(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    /// Full URL of the start-execution endpoint.
    pub fn execute_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.execute_path.trim_start_matches('/')
        )
    }
}

fn default_execute_path() -> String { "/api/executions".to_string() }
fn default_connect_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Identical completions closer together than this collapse into one.
    #[serde(default = "default_dedupe_window_ms")]
    pub dedupe_window_ms: u64,
    /// Capacity of the session notice bus.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl ExecutionConfig {
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dedupe_window_ms: default_dedupe_window_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_dedupe_window_ms() -> u64 { 2000 }
fn default_event_buffer() -> usize { 256 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive when no env override is set.
    #[serde(default)]
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowsmithError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowsmithError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Gateway settings, required for running executions.
    pub fn require_gateway(&self) -> Result<&GatewayConfig> {
        self.gateway
            .as_ref()
            .ok_or_else(|| FlowsmithError::Config("missing [gateway] section".to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_FLOWSMITH_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_FLOWSMITH_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_FLOWSMITH_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_FLOWSMITH_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_FLOWSMITH_VAR}\"");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.gateway.is_none());
        assert_eq!(config.execution.dedupe_window_ms, 2000);
        assert_eq!(config.execution.event_buffer, 256);
        assert!(config.log.filter.is_none());
        assert!(matches!(config.require_gateway(), Err(FlowsmithError::Config(_))));
    }

    #[test]
    fn test_gateway_defaults_from_minimal_toml() {
        let toml_str = r#"
[gateway]
base_url = "https://exec.example.com/"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let gw = config.require_gateway().unwrap();
        assert_eq!(gw.connect_timeout_secs, 10);
        assert!(gw.api_key.is_none());
        assert_eq!(gw.execute_url(), "https://exec.example.com/api/executions");
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/flowsmith.toml")).unwrap_err();
        assert!(matches!(err, FlowsmithError::ConfigNotFound(_)));
    }
}
