// tests/config_loading.rs
//
// AppConfig lookup order and env overrides. Env mutation is process-wide, so
// every test here runs serially.

use std::env;
use std::fs;
use std::time::Duration;

use serial_test::serial;

use niche_scout::config::{AppConfig, ENV_INSTANCES, ENV_PATH, ENV_SECONDARY_BIN, ENV_TRENDS_URL};

fn clear_env() {
    for k in [ENV_PATH, ENV_INSTANCES, ENV_SECONDARY_BIN, ENV_TRENDS_URL] {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    let cfg = AppConfig::load_default();

    env::set_current_dir(old).unwrap();
    let cfg = cfg.unwrap();
    assert_eq!(cfg.gateway.instances.len(), 4);
    assert_eq!(cfg.gateway.max_attempts, 4);
    assert_eq!(cfg.secondary.binary, "yt-dlp");
    assert_eq!(cfg.gateway_settings().request_timeout, Duration::from_millis(8000));
}

#[test]
#[serial]
fn env_path_is_loaded_and_overrides_apply() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("niche.toml");
    fs::write(
        &path,
        r#"
[gateway]
instances = ["https://one.test"]
max_attempts = 2
retry_delay_ms = 0

[secondary]
enabled = false

[trends]
window_days = 30
"#,
    )
    .unwrap();

    env::set_var(ENV_PATH, &path);
    env::set_var(ENV_INSTANCES, " https://a.test, ,https://b.test/ ");
    env::set_var(ENV_TRENDS_URL, "http://trends.test");
    let cfg = AppConfig::load_default();
    clear_env();

    let cfg = cfg.unwrap();
    assert_eq!(
        cfg.gateway.instances,
        vec!["https://a.test".to_string(), "https://b.test/".to_string()]
    );
    assert_eq!(cfg.gateway.max_attempts, 2);
    assert!(!cfg.secondary.enabled);
    assert_eq!(cfg.trends.base_url.as_deref(), Some("http://trends.test"));
    assert_eq!(cfg.analyzer_settings().trend_window_days, 30);
    // Unset keys keep their defaults.
    assert_eq!(cfg.cache.max_entries, 2000);
}

#[test]
#[serial]
fn env_path_to_missing_file_is_an_error() {
    clear_env();
    env::set_var(ENV_PATH, "/definitely/not/here/niche.toml");
    let res = AppConfig::load_default();
    clear_env();
    assert!(res.is_err());
}

#[test]
#[serial]
fn malformed_file_is_an_error() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("broken.toml");
    fs::write(&path, "[gateway\nmax_attempts = ").unwrap();
    env::set_var(ENV_PATH, &path);
    let res = AppConfig::load_default();
    clear_env();
    assert!(res.is_err());
}

#[test]
#[serial]
fn secondary_binary_override() {
    clear_env();
    env::set_var(ENV_SECONDARY_BIN, "/opt/tools/yt-dlp");
    let cfg = AppConfig::load_default();
    clear_env();
    assert_eq!(cfg.unwrap().secondary.binary, "/opt/tools/yt-dlp");
}

#[test]
#[serial]
fn analyzer_builds_from_default_config() {
    clear_env();
    let cfg = AppConfig::default();
    let analyzer = niche_scout::build_analyzer(&cfg).expect("analyzer builds");
    let status = analyzer.gateway().status();
    assert_eq!(status.instances.len(), 4);
    assert_eq!(status.secondary.map(|s| s.tool), Some("yt-dlp".to_string()));
}
