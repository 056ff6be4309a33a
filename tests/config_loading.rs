use std::io::Write;

use noteflow_core::config::AppConfig;
use noteflow_core::error::NoteflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
max_tokens = 1024
temperature = 0.2
degraded_mode = true

[model.retry]
max_retries = 2
initial_backoff_ms = 500

[engine]
node_timeout_secs = 20

[gateway]
bind = "0.0.0.0:9999"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 1024);
    assert!(config.model.degraded_mode);

    let retry = config.model.retry.expect("retry section");
    assert_eq!(retry.max_retries, 2);
    assert_eq!(retry.initial_backoff_ms, 500);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.engine.node_timeout_secs, 20);
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "gpt-4o-mini"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert!(config.model.retry.is_none());
    assert!(!config.model.degraded_mode);
    assert_eq!(config.engine.node_timeout_secs, 45);
    assert_eq!(config.gateway.bind, "127.0.0.1:8843");
}

#[test]
fn test_env_var_expansion_in_api_key() {
    std::env::set_var("NOTEFLOW_CONFIG_TEST_KEY", "sk-from-env");

    let toml_content = r#"
[model]
model_id = "gpt-4o-mini"
api_key = "${NOTEFLOW_CONFIG_TEST_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("sk-from-env".to_string()));
}

#[test]
fn test_missing_config_file() {
    let err = AppConfig::load(std::path::Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(err, NoteflowError::ConfigNotFound(_)));
}
