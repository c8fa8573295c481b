//! Loading orchestrator configuration from TOML files on disk.

use std::io::Write;

use agent_coordination::config::ConfigError;
use agent_coordination::{Agent, OrchestratorConfig};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_from_file_reads_sections() {
    let file = write_config(
        r#"
log_capacity = 50

[[backends]]
id = "local"
tier = "fast"
baseline_latency = 3.0
baseline_quality = 0.72
fallback = "remote"

[[backends]]
id = "remote"
tier = "high_capability"
baseline_latency = 9.0
baseline_quality = 0.93

[[agents]]
name = "drafter"
backend = "local"

[[agents]]
name = "floater"

[endpoint]
api_key = "k"

[endpoint.backend_urls]
remote = "https://remote.example/v1/chat/completions"
"#,
    );

    let config = OrchestratorConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.log_capacity, 50);
    assert_eq!(config.backends.len(), 2);
    assert_eq!(
        config.agents,
        vec![Agent::pinned("drafter", "local"), Agent::new("floater")]
    );
    assert_eq!(
        config.endpoint.url_for("remote"),
        "https://remote.example/v1/chat/completions"
    );
    assert_eq!(config.endpoint.url_for("local"), config.endpoint.url);

    let registry = config.registry().unwrap();
    assert_eq!(registry.static_fallback("local"), "remote");
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = OrchestratorConfig::from_file(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let file = write_config("backends = 7\n");
    let err = OrchestratorConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_unknown_fallback_is_rejected() {
    let file = write_config(
        r#"
[[backends]]
id = "only"
tier = "fast"
baseline_latency = 1.0
baseline_quality = 0.8
fallback = "ghost"
"#,
    );
    let config = OrchestratorConfig::from_file(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Registry(_))));
}
