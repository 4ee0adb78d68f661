use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Top-level flowrun configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Run-wide execution policy.
///
/// Also used directly as the options of a single graph execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Convert exhausted node failures into sentinel results instead of aborting.
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Upper bound on nodes in flight within one level. `None` = unbounded.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            retry: RetryConfig::default(),
            timeout_ms: default_timeout_ms(),
            max_concurrency: None,
        }
    }
}

impl EngineConfig {
    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.retry = RetryConfig {
            max_retries,
            backoff_ms,
        };
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }
}

fn default_timeout_ms() -> u64 { 30_000 }

/// Retry policy for a failing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay; attempt `n` (0-based) waits `backoff_ms * (n + 1)`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_backoff_ms() -> u64 { 1000 }

/// Run log export configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory for `{run_id}.jsonl` exports. Unset disables export.
    #[serde(default)]
    pub dir: Option<String>,
}

impl LogConfig {
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.dir.as_deref().map(expand_home)
    }
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| FlowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| FlowError::Config(e.to_string()))
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
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_FLOWRUN_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_FLOWRUN_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_FLOWRUN_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_FLOWRUN_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_FLOWRUN_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(!config.engine.continue_on_error);
        assert_eq!(config.engine.timeout_ms, 30_000);
        assert_eq!(config.engine.retry.max_retries, 0);
        assert_eq!(config.engine.retry.backoff_ms, 1000);
        assert!(config.engine.max_concurrency.is_none());
        assert!(config.log.log_dir().is_none());
    }

    #[test]
    fn test_partial_retry_section() {
        let toml_str = r#"
[engine.retry]
max_retries = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.retry.max_retries, 4);
        assert_eq!(config.engine.retry.backoff_ms, 1000);
    }

    #[test]
    fn test_builder_clamps_concurrency() {
        let cfg = EngineConfig::default().with_max_concurrency(0);
        assert_eq!(cfg.max_concurrency, Some(1));
    }
}
