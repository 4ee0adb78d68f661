use std::io::Write;

use flowrun_core::config::AppConfig;
use flowrun_core::error::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
continue_on_error = true
timeout_ms = 5000
max_concurrency = 4

[engine.retry]
max_retries = 2
backoff_ms = 100

[log]
dir = "/tmp/flowrun-runs"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert!(config.engine.continue_on_error);
    assert_eq!(config.engine.timeout_ms, 5000);
    assert_eq!(config.engine.max_concurrency, Some(4));
    assert_eq!(config.engine.retry.max_retries, 2);
    assert_eq!(config.engine.retry.backoff_ms, 100);
    assert_eq!(
        config.log.log_dir().as_deref(),
        Some(std::path::Path::new("/tmp/flowrun-runs"))
    );
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("FLOWRUN_TEST_LOG_DIR", "/var/log/flowrun");

    let toml_content = r#"
[log]
dir = "${FLOWRUN_TEST_LOG_DIR}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.log.dir.as_deref(), Some("/var/log/flowrun"));

    std::env::remove_var("FLOWRUN_TEST_LOG_DIR");
}

#[test]
fn test_empty_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert!(!config.engine.continue_on_error);
    assert_eq!(config.engine.timeout_ms, 30_000);
    assert_eq!(config.engine.retry.max_retries, 0);
    assert_eq!(config.engine.retry.backoff_ms, 1000);
    assert!(config.engine.max_concurrency.is_none());
    assert!(config.log.dir.is_none());
}

#[test]
fn test_missing_file_is_config_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/flowrun.toml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}

#[test]
fn test_malformed_config_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\ntimeout_ms = \"soon\"\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}
