// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./wotp.toml` > `~/.config/wotp/wotp.toml` > `/etc/wotp/wotp.toml`
//! with environment variable overrides via `WOTP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::WotpConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/wotp/wotp.toml` (system-wide)
/// 3. `~/.config/wotp/wotp.toml` (user XDG config)
/// 4. `./wotp.toml` (local directory)
/// 5. `WOTP_*` environment variables
pub fn load_config() -> Result<WotpConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WotpConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WotpConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WotpConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WotpConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WotpConfig::default()))
        .merge(Toml::file("/etc/wotp/wotp.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("wotp/wotp.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("wotp.toml"))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name onto a dotted config path.
///
/// Uses explicit section prefixes rather than splitting on `_`, since key
/// names contain underscores: `WOTP_WHATSAPP_BRIDGE_URL` must become
/// `whatsapp.bridge_url`, and `WOTP_QUEUE_OTP_CONCURRENCY` becomes
/// `queue.otp.concurrency`.
pub fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 6] = [
        "daemon_",
        "storage_",
        "whatsapp_",
        "otp_",
        "delivery_log_",
        "gateway_",
    ];

    if let Some(rest) = key.strip_prefix("queue_") {
        for pool in ["otp_", "message_"] {
            if let Some(field) = rest.strip_prefix(pool) {
                return format!("queue.{}.{field}", pool.trim_end_matches('_'));
            }
        }
        return format!("queue.{rest}");
    }

    for section in SECTIONS {
        if let Some(field) = key.strip_prefix(section) {
            return format!("{}.{field}", section.trim_end_matches('_'));
        }
    }

    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("WOTP_").map(|key| map_env_key(key.as_str()).into())
}
