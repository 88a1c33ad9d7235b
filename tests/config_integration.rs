//! Configuration Integration Tests
//!
//! Loading from disk and the environment, and the effect of engine
//! thresholds on a full refresh.

use chrono::{TimeZone, Utc};
use serial_test::serial;
use tempfile::TempDir;

use boardpulse::core::{Config, RetryConfig, CONFIG_ENV_VAR};
use boardpulse::{Dashboard, SnapshotSource};

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("boardpulse.toml");
    std::fs::write(&path, content).unwrap();
    path
}

/// Run `f` with `BOARDPULSE_CONFIG` pointing at `path`, restoring it afterwards.
fn with_config_env<T>(path: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(CONFIG_ENV_VAR).ok();
    std::env::set_var(CONFIG_ENV_VAR, path);

    let result = f();

    match original {
        Some(val) => std::env::set_var(CONFIG_ENV_VAR, val),
        None => std::env::remove_var(CONFIG_ENV_VAR),
    }
    result
}

#[test]
#[serial(config_env)]
fn test_load_from_env_var() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [engine]
        wip_limit = 5
        max_recommendations = 3

        [output]
        format = "json"
        "#,
    );

    let config = with_config_env(&path, Config::load).unwrap();
    assert_eq!(config.engine.wip_limit, Some(5));
    assert_eq!(config.engine.max_recommendations, 3);
    assert_eq!(config.output.format, "json");
    // Untouched knobs keep their defaults
    assert_eq!(config.engine.assignee_capacity, 3);
}

#[test]
#[serial(config_env)]
fn test_env_var_to_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");
    assert!(with_config_env(&path, Config::load).is_err());
}

#[test]
#[serial(config_env)]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();

    let zero_capacity = write_config(&dir, "[engine]\nassignee_capacity = 0\n");
    let err = with_config_env(&zero_capacity, Config::load).unwrap_err();
    assert!(err.to_string().contains("assignee_capacity"));

    let bad_format = write_config(&dir, "[output]\nformat = \"yaml\"\n");
    let err = with_config_env(&bad_format, Config::load).unwrap_err();
    assert!(err.to_string().contains("yaml"));

    let duplicate = write_config(
        &dir,
        r#"
        [[engine.stall_overrides]]
        item_type = "Bug"
        hours = 4

        [[engine.stall_overrides]]
        item_type = "bug"
        hours = 8
        "#,
    );
    assert!(with_config_env(&duplicate, Config::load).is_err());
}

#[test]
fn test_load_from_file_roundtrips_defaults() {
    let dir = TempDir::new().unwrap();
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    let path = write_config(&dir, &rendered);

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.engine, Config::default().engine);
}

#[test]
fn test_stall_override_changes_refresh() {
    let snapshot = r#"{
      "project": { "key": "ENG", "kind": "software" },
      "boards": [],
      "workflow": { "statuses": [{ "name": "Doing", "category": "indeterminate" }] },
      "issues": [
        { "key": "ENG-1", "status": "Doing", "type": "Bug", "created": "2024-05-01T00:00:00Z",
          "statusChangedAt": "2024-05-10T06:00:00Z" },
        { "key": "ENG-2", "status": "Doing", "type": "Story", "created": "2024-05-01T00:00:00Z",
          "statusChangedAt": "2024-05-10T06:00:00Z" }
      ]
    }"#;
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

    let refresh = |config: Config| {
        let source = SnapshotSource::from_json(snapshot).unwrap();
        let dashboard =
            Dashboard::new(Box::new(source), config).with_retry(RetryConfig::no_retry());
        tokio_test::block_on(dashboard.refresh("ENG", now))
    };

    // Six hours in status: below the global threshold
    let baseline = refresh(Config::default());
    assert!(baseline.items.iter().all(|i| !i.is_stalled));

    let mut config = Config::default();
    config.engine = config.engine.with_stall_override("bug", 4.0);
    let tuned = refresh(config);

    assert!(tuned.item("ENG-1").is_some_and(|i| i.is_stalled));
    assert!(tuned.item("ENG-2").is_some_and(|i| !i.is_stalled));
    assert_eq!(tuned.metrics.unwrap().counts.stalled, 1);
}
