// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the WOTP configuration system.

use wotp_config::diagnostic::{suggest_key, ConfigError};
use wotp_config::model::WotpConfig;
use wotp_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_wotp_config() {
    let toml = r#"
[daemon]
log_level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[whatsapp]
connect_timeout_secs = 60
bridge_url = "ws://127.0.0.1:8787/bridge"

[queue.otp]
concurrency = 4
warmup_secs = 2

[queue.message]
concurrency = 1

[otp]
default_length = 8
default_type = "alphanumeric"

[delivery_log]
retention_days = 30

[gateway]
port = 8080

[[gateway.api_keys]]
account_id = "acct-1"
key = "0123456789abcdef0123"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.whatsapp.connect_timeout_secs, 60);
    assert_eq!(
        config.whatsapp.bridge_url.as_deref(),
        Some("ws://127.0.0.1:8787/bridge")
    );
    assert_eq!(config.queue.otp.concurrency, 4);
    assert_eq!(config.queue.otp.warmup_secs, 2);
    // Keys omitted from a pool table keep that pool's defaults.
    assert_eq!(config.queue.otp.backoff_ms, 2_000);
    assert_eq!(config.queue.message.concurrency, 1);
    assert_eq!(config.queue.message.backoff_ms, 3_000);
    assert_eq!(config.otp.default_length, 8);
    assert_eq!(config.delivery_log.retention_days, 30);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.api_keys.len(), 1);
    assert_eq!(config.gateway.api_keys[0].account_id, "acct-1");
}

#[test]
fn unknown_field_in_whatsapp_produces_error() {
    let toml = r#"
[whatsapp]
bridge_ulr = "ws://localhost"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("bridge_ulr"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty config should use defaults");
    assert_eq!(config.daemon.log_level, "info");
    assert!(config.storage.wal_mode);
    assert!(config.whatsapp.bridge_url.is_none());
    assert_eq!(config.queue.otp.concurrency, 10);
    assert_eq!(config.queue.message.concurrency, 5);
    assert!(config.gateway.api_keys.is_empty());
}

/// A dotted override (what `WOTP_QUEUE_OTP_CONCURRENCY` maps to) wins over TOML.
#[test]
fn dotted_override_reaches_nested_pool() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[queue.otp]
concurrency = 3
"#;

    let config: WotpConfig = Figment::new()
        .merge(Serialized::defaults(WotpConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("queue.otp.concurrency", 7))
        .extract()
        .expect("should merge env override");

    assert_eq!(config.queue.otp.concurrency, 7);
    assert_eq!(config.queue.message.concurrency, 5);
}

#[test]
fn dotted_override_sets_bridge_url() {
    use figment::{providers::Serialized, Figment};

    let config: WotpConfig = Figment::new()
        .merge(Serialized::defaults(WotpConfig::default()))
        .merge(("whatsapp.bridge_url", "wss://bridge.internal/ws"))
        .extract()
        .expect("should set bridge_url via dot notation");

    assert_eq!(
        config.whatsapp.bridge_url.as_deref(),
        Some("wss://bridge.internal/ws")
    );
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn diagnostic_suggests_warmup_secs() {
    let suggestion = suggest_key("warmup_sec", &["concurrency", "warmup_secs", "backoff_ms"]);
    assert_eq!(suggestion.as_deref(), Some("warmup_secs"));
}

#[test]
fn diagnostic_error_includes_unknown_key_and_valid_keys() {
    let toml = r#"
[queue.otp]
concurency = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "concurency"
                && suggestion.as_deref() == Some("concurrency")
                && valid_keys.contains("max_attempts")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error for 'concurency', got: {errors:?}"
    );
}

#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[gateway]
port = "eighty"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "error should mention type mismatch, got: {err_str}"
    );
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "concurency".to_string(),
        suggestion: Some("concurrency".to_string()),
        valid_keys: "concurrency, max_attempts".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `concurrency`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("concurency"));
}

#[test]
fn load_and_validate_rejects_semantic_errors() {
    let toml = r#"
[queue.message]
concurrency = 0

[otp]
default_type = "emoji"
"#;

    let errors = load_and_validate_str(toml).expect_err("validation should fail");
    assert_eq!(errors.len(), 2, "got: {errors:?}");
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn load_and_validate_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.otp.default_length, 6);
}
