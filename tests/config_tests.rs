//! Configuration layering: defaults, file, environment
use std::collections::HashMap;

use pinn_live_monitor_lib::infrastructure::{AppConfig, ConfigManager};

fn no_env() -> Option<HashMap<String, String>> {
    Some(HashMap::new())
}

#[test]
fn partial_json_file_overrides_only_its_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.json");
    std::fs::write(
        &path,
        r#"{ "server": { "base_url": "http://trainer:8080" }, "polling": { "interval_ms": 250 } }"#,
    )
    .unwrap();

    let config = ConfigManager::with_path(&path).load_with_env(no_env()).unwrap();

    assert_eq!(config.server.base_url, "http://trainer:8080");
    assert_eq!(config.polling.interval_ms, 250);
    assert_eq!(config.server.timeout_seconds, AppConfig::default().server.timeout_seconds);
    assert_eq!(config.session.purpose, "forward_problems");
    assert!(!config.polling.backoff.enabled);
}

#[test]
fn toml_file_and_environment_are_layered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.toml");
    std::fs::write(
        &path,
        r#"
[session]
purpose = "inverse_problems"
equation_type = "wave"

[polling.backoff]
enabled = true
base_delay_ms = 200
"#,
    )
    .unwrap();

    let env = HashMap::from([
        ("PINN_MONITOR__SESSION__EQUATION_TYPE".to_string(), "burgers".to_string()),
        ("PINN_MONITOR__LOGGING__LEVEL".to_string(), "debug".to_string()),
    ]);
    let config = ConfigManager::with_path(&path).load_with_env(Some(env)).unwrap();

    assert_eq!(config.session.purpose, "inverse_problems");
    assert_eq!(config.session.equation_type, "burgers");
    assert_eq!(config.logging.level, "debug");
    assert!(config.polling.backoff.enabled);
    assert_eq!(config.polling.backoff.base_delay_ms, 200);
    assert_eq!(config.polling.backoff.max_delay_ms, 10_000);
}

#[test]
fn invalid_file_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.json");
    std::fs::write(&path, r#"{ "polling": { "interval_ms": 0 } }"#).unwrap();

    let err = ConfigManager::with_path(&path)
        .load_with_env(no_env())
        .unwrap_err();
    assert!(err.to_string().contains("interval_ms"));
}

#[tokio::test]
async fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("nested").join("monitor.json"));

    let mut config = AppConfig::default();
    config.session.equation_type = "allen_cahn".into();
    config.polling.interval_ms = 1_000;
    manager.save_config(&config).await.unwrap();

    assert!(manager.config_path().exists());
    let loaded = manager.load_with_env(no_env()).unwrap();
    assert_eq!(loaded, config);
}
