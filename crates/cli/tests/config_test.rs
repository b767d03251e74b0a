//! # Configuration Tests
//!
//! `handelingen-cli` is a binary crate, so the config module is included
//! directly into the test binary.

#[path = "../src/config.rs"]
#[allow(dead_code)]
mod config;

use self::config::{get_config, ConfigError, FetchConfig};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

// Environment variables are process-global; tests touching them run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env_vars() {
    for (key, _) in env::vars() {
        if key.starts_with("HANDELINGEN__") {
            env::remove_var(key);
        }
    }
    env::remove_var("FIREWORKS_API_KEY");
    env::remove_var("HANDELINGEN_TEST_KEY");
}

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn test_missing_explicit_file_is_not_found() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();

    let result = get_config(Some(std::path::Path::new("/nonexistent/handelingen.yml")));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_file_values_and_defaults() {
    // --- Arrange ---
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    let (_dir, path) = write_config(
        r#"
data_dir: /srv/handelingen
groups: ["2019-2020"]
archive:
  exclude_pattern: ""
fetch:
  max_retries: 2
"#,
    );

    // --- Act ---
    let config = get_config(Some(&path)).unwrap();

    // --- Assert ---
    assert_eq!(config.data_dir, PathBuf::from("/srv/handelingen"));
    assert_eq!(config.groups, vec!["2019-2020"]);
    assert_eq!(config.archive.exclude_pattern, "");
    assert_eq!(config.archive.base_url, "https://zoek.officielebekendmakingen.nl");
    assert!(config.archive.warm_up_on_failure);
    assert_eq!(config.fetch.max_retries, 2);
    assert_eq!(config.fetch.retryable_status, vec![500]);
    assert_eq!(config.retry_fetch.timeout_secs, 30);
    assert_eq!(config.analysis.max_tokens, 2048);
    assert_eq!(
        config.analysis.finding_fields,
        vec!["gevonden_delegitimatie", "gevallen_delegitimatie"]
    );
    assert_eq!(config.analysis.api_key, None);
}

#[test]
fn test_environment_overrides_file() {
    // --- Arrange ---
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    let (_dir, path) = write_config("fetch:\n  max_retries: 2\n");
    env::set_var("HANDELINGEN__FETCH__MAX_RETRIES", "7");
    env::set_var("HANDELINGEN__GROUPS", "2020-2021,2019-2020");
    env::set_var("HANDELINGEN__ANALYSIS__MODEL", "test-model");

    // --- Act ---
    let config = get_config(Some(&path)).unwrap();

    // --- Assert ---
    assert_eq!(config.fetch.max_retries, 7);
    assert_eq!(config.groups, vec!["2020-2021", "2019-2020"]);
    assert_eq!(config.analysis.model, "test-model");

    clear_env_vars();
}

#[test]
fn test_partial_retry_fetch_keeps_patient_defaults() {
    // --- Arrange ---
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    let (_dir, path) = write_config("retry_fetch:\n  max_retries: 4\n");
    env::set_var("HANDELINGEN__RETRY_FETCH__BACKOFF_SECS", "5");

    // --- Act ---
    let config = get_config(Some(&path)).unwrap();

    // --- Assert ---
    assert_eq!(config.retry_fetch.max_retries, 4);
    assert_eq!(config.retry_fetch.backoff_secs, 5);
    assert_eq!(config.retry_fetch.timeout_secs, 30);
    assert_eq!(
        config.retry_fetch.policy().timeout_per_attempt,
        Duration::from_secs(30)
    );
    assert_eq!(config.fetch.timeout_secs, 10);

    clear_env_vars();
}

#[test]
fn test_file_placeholders_are_substituted() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("HANDELINGEN_TEST_KEY", "from-placeholder");
    let (_dir, path) = write_config("analysis:\n  api_key: ${HANDELINGEN_TEST_KEY}\n");

    let config = get_config(Some(&path)).unwrap();

    assert_eq!(config.analysis.api_key.as_deref(), Some("from-placeholder"));
    clear_env_vars();
}

#[test]
fn test_api_key_falls_back_to_environment() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env_vars();
    env::set_var("FIREWORKS_API_KEY", "secret");
    let (_dir, path) = write_config("groups: [\"2023-2024\"]\n");

    let config = get_config(Some(&path)).unwrap();

    assert_eq!(config.analysis.api_key.as_deref(), Some("secret"));
    clear_env_vars();
}

#[test]
fn test_fetch_config_builds_retry_policy() {
    let fetch = FetchConfig {
        max_retries: 0,
        backoff_secs: 3,
        timeout_secs: 12,
        retryable_status: vec![500, 503],
        politeness_min_ms: 10,
        politeness_max_ms: 20,
    };

    let policy = fetch.policy();

    assert_eq!(policy.max_retries, 1);
    assert_eq!(policy.backoff_base, Duration::from_secs(3));
    assert_eq!(policy.timeout_per_attempt, Duration::from_secs(12));
    assert!(policy.is_retryable_status(503));
    assert_eq!(policy.politeness_max, Duration::from_millis(20));
}
