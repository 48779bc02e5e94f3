use std::{env, fs};

use bpjs_server::config::loader::load_config;

const VALID: &str = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[logging.targets]
bpjs_client = "trace"

[apol]
base_url = "https://apijkn.bpjs-kesehatan.go.id/apotek-rest"
consumer_id = "1234"
secret_key = "apol-secret"
user_key = "apol-user-key"
pharmacy_provider_code = "0112A017"

[rencana_kontrol]
base_url = "https://apijkn.bpjs-kesehatan.go.id/vclaim-rest"
consumer_id = "5678"
secret_key = "vclaim-secret"
user_key = "vclaim-user-key"
timeout_secs = 20
"#;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("bpjs.toml");
    fs::write(&path, VALID).expect("write toml");

    // 1) Valid config parses, defaults filled in
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.logging.targets.get("bpjs_client").map(String::as_str), Some("trace"));
    assert_eq!(cfg.apol.consumer_id, "1234");
    assert_eq!(cfg.apol.timeout_secs, 30);
    assert_eq!(cfg.apol.retry.max_attempts, 1);
    assert_eq!(cfg.apol.utc_offset_hours, 7);
    assert_eq!(cfg.rencana_kontrol.timeout_secs, 20);
    assert_eq!(cfg.rencana_kontrol.retry.max_attempts, 3);
    assert_eq!(cfg.rencana_kontrol.retry.initial_backoff_ms, 1000);
    assert_eq!(cfg.rencana_kontrol.retry.multiplier, 1);
    assert!(cfg.storage.database_url.is_none());

    // The two credential sets stay independent
    assert_ne!(
        cfg.apol.credentials().secret_key,
        cfg.rencana_kontrol.credentials().secret_key
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("BPJS__APOL__PHARMACY_PROVIDER_CODE", "0999A001");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.apol.pharmacy_provider_code, "0999A001");
    unsafe {
        env::remove_var("BPJS__APOL__PHARMACY_PROVIDER_CODE");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid = VALID.replace("level = \"debug\"", "level = \"verbose\"");
    fs::write(&invalid_path, invalid).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("logging.level must be one of"));

    // 4) Missing gateway section is a deserialize error
    let partial_path = dir.path().join("partial.toml");
    fs::write(&partial_path, "[server]\nport = 9000\n").expect("write partial toml");
    let err = load_config(partial_path.to_str()).expect_err("expected missing section");
    assert!(err.contains("config deserialize error"));
}
