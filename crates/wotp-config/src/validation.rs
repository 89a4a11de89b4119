// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and sane worker limits.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{WorkerPoolConfig, WotpConfig};

/// Valid values for `otp.default_type`.
pub const OTP_TYPES: [&str; 3] = ["numeric", "alphanumeric", "alpha"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WotpConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(invalid("storage.database_path must not be empty"));
    }

    let level = config.daemon.log_level.trim().to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        errors.push(invalid(format!(
            "daemon.log_level must be one of trace, debug, info, warn, error, got `{}`",
            config.daemon.log_level
        )));
    }

    validate_whatsapp(config, &mut errors);
    validate_pool("queue.otp", &config.queue.otp, &mut errors);
    validate_pool("queue.message", &config.queue.message, &mut errors);

    if config.queue.maintenance_interval_secs == 0 {
        errors.push(invalid("queue.maintenance_interval_secs must be at least 1"));
    }

    if !(4..=12).contains(&config.otp.default_length) {
        errors.push(invalid(format!(
            "otp.default_length must be between 4 and 12, got {}",
            config.otp.default_length
        )));
    }

    if !OTP_TYPES.contains(&config.otp.default_type.as_str()) {
        errors.push(invalid(format!(
            "otp.default_type must be one of {}, got `{}`",
            OTP_TYPES.join(", "),
            config.otp.default_type
        )));
    }

    if !(30..=3600).contains(&config.otp.default_expiry_secs) {
        errors.push(invalid(format!(
            "otp.default_expiry_secs must be between 30 and 3600, got {}",
            config.otp.default_expiry_secs
        )));
    }

    if !config.otp.message_template.contains("{{otp}}") {
        errors.push(invalid("otp.message_template must contain the `{{otp}}` placeholder"));
    }

    if config.delivery_log.retention_days == 0 {
        errors.push(invalid("delivery_log.retention_days must be at least 1"));
    }

    validate_gateway(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_whatsapp(config: &WotpConfig, errors: &mut Vec<ConfigError>) {
    let wa = &config.whatsapp;

    if wa.connect_timeout_secs == 0 {
        errors.push(invalid("whatsapp.connect_timeout_secs must be at least 1"));
    }
    if wa.max_reconnect_attempts == 0 {
        errors.push(invalid("whatsapp.max_reconnect_attempts must be at least 1"));
    }
    if wa.send_attempts == 0 {
        errors.push(invalid("whatsapp.send_attempts must be at least 1"));
    }
    if wa.reconnect_base_ms > wa.reconnect_max_ms {
        errors.push(invalid(format!(
            "whatsapp.reconnect_base_ms ({}) must not exceed whatsapp.reconnect_max_ms ({})",
            wa.reconnect_base_ms, wa.reconnect_max_ms
        )));
    }
    if let Some(url) = &wa.bridge_url
        && !(url.starts_with("ws://") || url.starts_with("wss://"))
    {
        errors.push(invalid(format!(
            "whatsapp.bridge_url must be a ws:// or wss:// URL, got `{url}`"
        )));
    }
}

fn validate_pool(section: &str, pool: &WorkerPoolConfig, errors: &mut Vec<ConfigError>) {
    if pool.concurrency == 0 {
        errors.push(invalid(format!("{section}.concurrency must be at least 1")));
    }
    if pool.max_attempts == 0 {
        errors.push(invalid(format!("{section}.max_attempts must be at least 1")));
    }
    if pool.poll_interval_ms == 0 {
        errors.push(invalid(format!("{section}.poll_interval_ms must be at least 1")));
    }
}

fn validate_gateway(config: &WotpConfig, errors: &mut Vec<ConfigError>) {
    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(invalid("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(invalid(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    let mut seen_keys = HashSet::new();
    for (i, api_key) in config.gateway.api_keys.iter().enumerate() {
        if api_key.account_id.trim().is_empty() {
            errors.push(invalid(format!(
                "gateway.api_keys[{i}].account_id must not be empty"
            )));
        }
        if api_key.key.len() < 16 {
            errors.push(invalid(format!(
                "gateway.api_keys[{i}].key must be at least 16 characters"
            )));
        }
        if !seen_keys.insert(api_key.key.as_str()) {
            errors.push(invalid(format!(
                "gateway.api_keys[{i}] duplicates an earlier key"
            )));
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
