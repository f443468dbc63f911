use std::collections::HashMap;
use std::io::Write;

use crate::config::models::AppConfig;
use crate::models::Operator;

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());

    assert!(config.database.is_in_memory());
    assert_eq!(config.worker.computing_power, 5);
    assert_eq!(config.dispatcher.reclaim_grace_ms, 1000);
    assert_eq!(config.api.bind_address, "0.0.0.0:8080");
    assert_eq!(
        config
            .dispatcher
            .operation_times
            .for_operator(Operator::Div)
            .as_millis(),
        1000
    );
}

#[test]
fn test_config_from_toml() {
    let toml_content = r#"
[database]
url = "sqlite:calc_test.db"
max_connections = 3

[dispatcher]
enabled = true
reclaim_grace_ms = 500

[dispatcher.operation_times]
addition_ms = 10
subtraction_ms = 20
multiplication_ms = 30
division_ms = 40

[worker]
enabled = true
agent_id = "agent-7"
computing_power = 8
dispatcher_url = "http://orchestrator:8080"
poll_backoff_ms = 250
poll_jitter_ms = 50
request_timeout_seconds = 5

[api]
enabled = true
bind_address = "127.0.0.1:9000"
cors_enabled = false

[observability]
log_level = "debug"
log_format = "json"
metrics_enabled = true
metrics_port = 9100
"#;

    let config = AppConfig::from_toml(toml_content).unwrap();
    assert_eq!(config.database.url, "sqlite:calc_test.db");
    assert!(!config.database.is_in_memory());
    assert_eq!(config.dispatcher.operation_times.multiplication_ms, 30);
    assert_eq!(config.dispatcher.reclaim_grace_ms, 500);
    assert_eq!(config.worker.computing_power, 8);
    assert_eq!(config.worker.agent_id, "agent-7");
    assert_eq!(config.api.bind_address, "127.0.0.1:9000");
    assert_eq!(config.observability.log_format, "json");
    assert_eq!(config.observability.metrics_port, 9100);
}

#[test]
fn test_config_to_toml_roundtrip() {
    let mut config = AppConfig::default();
    config.worker.computing_power = 3;
    config.dispatcher.operation_times.addition_ms = 42;

    let toml_str = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&toml_str).unwrap();

    assert_eq!(parsed.worker.computing_power, 3);
    assert_eq!(parsed.dispatcher.operation_times, config.dispatcher.operation_times);
    assert_eq!(parsed.database.url, config.database.url);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = AppConfig::default();
    config.database.url = "postgres://localhost/calc".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.api.bind_address = "not-an-address".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.observability.log_format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[worker]
computing_power = 2

[dispatcher.operation_times]
addition_ms = 5
subtraction_ms = 5
multiplication_ms = 5
division_ms = 5
"#
    )
    .unwrap();

    let config = AppConfig::load(file.path().to_str()).unwrap();
    assert_eq!(config.dispatcher.operation_times.addition_ms, 5);
    // untouched sections keep their defaults
    assert_eq!(config.dispatcher.reclaim_grace_ms, 1000);
    assert!(config.api.enabled);
}

#[test]
fn test_load_missing_file_fails() {
    assert!(AppConfig::load(Some("/definitely/not/here/calc.toml")).is_err());
}

#[test]
fn test_flat_env_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("PORT", "9999"),
        ("TIME_ADDITION_MS", "100"),
        ("TIME_SUBTRACTION_MS", "200"),
        ("TIME_MULTIPLICATIONS_MS", "300"),
        ("TIME_DIVISIONS_MS", "oops"),
        ("COMPUTING_POWER", "12"),
        ("TASK_URL", "http://orchestrator:8080/internal/task"),
    ]);

    let mut config = AppConfig::default();
    config.apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(config.api.bind_address, "0.0.0.0:9999");
    assert_eq!(config.dispatcher.operation_times.addition_ms, 100);
    assert_eq!(config.dispatcher.operation_times.subtraction_ms, 200);
    assert_eq!(config.dispatcher.operation_times.multiplication_ms, 300);
    // invalid values keep the previous setting
    assert_eq!(config.dispatcher.operation_times.division_ms, 1000);
    assert_eq!(config.worker.computing_power, 12);
    assert_eq!(config.worker.dispatcher_url, "http://orchestrator:8080");
    assert!(config.validate().is_ok());
}

#[test]
fn test_flat_env_overrides_ignore_zero_power() {
    let mut config = AppConfig::default();
    config.apply_env_overrides(|key| (key == "COMPUTING_POWER").then(|| "0".to_string()));
    assert_eq!(config.worker.computing_power, 5);
}
