// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::load_config_from_str;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[server]
host = "127.0.0.1"
port = 9090
request_timeout_secs = 30

[storage]
database_path = "/tmp/courier-test.db"

[broker]
prefetch = 4
poll_interval_ms = 100
lock_timeout_secs = 60
max_attempts = 5

[scheduler]
interval_secs = 2
batch_size = 10

[rate_limit]
enabled = false
default_limit = 120

[rate_limit.tiers]
free = 30
enterprise = 6000

[platforms.sms]
provider = "twilio"

[platforms.email]
provider = "sendgrid"

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.request_timeout_secs, 30);
    assert_eq!(config.storage.database_path, "/tmp/courier-test.db");
    assert_eq!(config.broker.prefetch, 4);
    assert_eq!(config.broker.poll_interval_ms, 100);
    assert_eq!(config.broker.lock_timeout_secs, 60);
    assert_eq!(config.broker.max_attempts, 5);
    assert_eq!(config.scheduler.interval_secs, 2);
    assert_eq!(config.scheduler.batch_size, 10);
    assert!(!config.rate_limit.enabled);
    assert_eq!(config.rate_limit.default_limit, 120);
    assert_eq!(config.rate_limit.tiers.get("free"), Some(&30));
    assert_eq!(config.rate_limit.tiers.get("enterprise"), Some(&6000));
    assert_eq!(config.platforms.sms.provider, "twilio");
    assert_eq!(config.platforms.email.provider, "sendgrid");
    assert_eq!(config.platforms.whatsapp.provider, "mock");
    assert_eq!(config.logging.level, "debug");
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config should load defaults");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.broker.prefetch, 10);
    assert_eq!(config.scheduler.interval_secs, 10);
    assert_eq!(config.scheduler.batch_size, 50);
    assert!(config.rate_limit.enabled);
    assert_eq!(config.rate_limit.default_limit, 60);
    assert_eq!(config.rate_limit.tiers.get("free"), Some(&60));
    assert_eq!(config.platforms.sms.provider, "mock");
    assert_eq!(config.logging.level, "info");
}

/// Unknown field in a section is rejected at load time.
#[test]
fn unknown_field_produces_error() {
    let toml = r#"
[server]
hots = "127.0.0.1"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("hots"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unknown top-level section is rejected at load time.
#[test]
fn unknown_section_produces_error() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Partial sections merge over defaults rather than replacing them.
#[test]
fn partial_section_keeps_remaining_defaults() {
    let toml = r#"
[broker]
prefetch = 2
"#;

    let config = load_config_from_str(toml).unwrap();
    assert_eq!(config.broker.prefetch, 2);
    assert_eq!(config.broker.lock_timeout_secs, 300);
    assert_eq!(config.broker.max_attempts, 3);
}
