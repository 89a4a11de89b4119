// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the WOTP daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level WOTP configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WotpConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session supervisor and transport settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Outbound queue and worker settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// OTP generation and message template settings.
    #[serde(default)]
    pub otp: OtpConfig,

    /// Delivery log retention.
    #[serde(default)]
    pub delivery_log: DeliveryLogConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("wotp").join("wotp.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("wotp.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Session supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Seconds a session may stay connecting before the watchdog tears it down.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Consecutive closes without an open before the session is given up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// First reconnect delay; doubles per attempt.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Upper bound for the reconnect delay.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Attempts made by a single send call.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,

    /// Pause between send attempts after a transport error.
    #[serde(default = "default_send_retry_delay_ms")]
    pub send_retry_delay_ms: u64,

    /// Grace wait for a session that is still connecting when a send arrives.
    #[serde(default = "default_connecting_grace_ms")]
    pub connecting_grace_ms: u64,

    /// How long the connect endpoint waits for a pairing outcome.
    #[serde(default = "default_pairing_wait_secs")]
    pub pairing_wait_secs: u64,

    /// WebSocket URL of the protocol bridge sidecar. Required by `wotp serve`.
    #[serde(default)]
    pub bridge_url: Option<String>,

    /// Per-request timeout for bridge calls.
    #[serde(default = "default_bridge_request_timeout_secs")]
    pub bridge_request_timeout_secs: u64,

    /// Browser name announced to WhatsApp when linking a device.
    #[serde(default = "default_browser_name")]
    pub browser_name: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            send_attempts: default_send_attempts(),
            send_retry_delay_ms: default_send_retry_delay_ms(),
            connecting_grace_ms: default_connecting_grace_ms(),
            pairing_wait_secs: default_pairing_wait_secs(),
            bridge_url: None,
            bridge_request_timeout_secs: default_bridge_request_timeout_secs(),
            browser_name: default_browser_name(),
        }
    }
}

impl WhatsAppConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pairing_wait(&self) -> Duration {
        Duration::from_secs(self.pairing_wait_secs)
    }

    pub fn bridge_request_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_request_timeout_secs)
    }
}

fn default_connect_timeout_secs() -> u64 {
    120
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_base_ms() -> u64 {
    5_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_send_attempts() -> u32 {
    3
}

fn default_send_retry_delay_ms() -> u64 {
    2_000
}

fn default_connecting_grace_ms() -> u64 {
    3_000
}

fn default_pairing_wait_secs() -> u64 {
    30
}

fn default_bridge_request_timeout_secs() -> u64 {
    20
}

fn default_browser_name() -> String {
    "WOTP".to_string()
}

/// Worker pool configuration for both outbound queues.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    #[serde(default = "WorkerPoolConfig::otp_defaults")]
    pub otp: WorkerPoolConfig,

    #[serde(default = "WorkerPoolConfig::message_defaults")]
    pub message: WorkerPoolConfig,

    /// Seconds between retention passes.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            otp: WorkerPoolConfig::otp_defaults(),
            message: WorkerPoolConfig::message_defaults(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

fn default_maintenance_interval_secs() -> u64 {
    3_600
}

/// Settings for one named queue and its worker pool.
///
/// Missing keys inside a `[queue.otp]` or `[queue.message]` table fall back
/// to the OTP defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default = "WorkerPoolConfig::otp_defaults")]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Delivery attempts per job before it is marked failed.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_ms: u64,
    /// How long a worker waits for a disconnected session to come up.
    pub warmup_secs: u64,
    /// Sleep between dequeue polls when the queue is empty.
    pub poll_interval_ms: u64,
    /// Completed jobs kept per queue.
    pub keep_completed: u32,
    /// Failed jobs kept per queue.
    pub keep_failed: u32,
}

impl WorkerPoolConfig {
    pub fn otp_defaults() -> Self {
        Self {
            concurrency: 10,
            max_attempts: 3,
            backoff_ms: 2_000,
            warmup_secs: 8,
            poll_interval_ms: 500,
            keep_completed: 100,
            keep_failed: 200,
        }
    }

    pub fn message_defaults() -> Self {
        Self {
            concurrency: 5,
            backoff_ms: 3_000,
            warmup_secs: 5,
            ..Self::otp_defaults()
        }
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// OTP generation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// Code length used when a request does not specify one (4..=12).
    #[serde(default = "default_otp_length")]
    pub default_length: usize,

    /// Character set: `numeric`, `alphanumeric`, or `alpha`.
    #[serde(default = "default_otp_type")]
    pub default_type: String,

    /// Expiry stated to callers, in seconds (30..=3600).
    #[serde(default = "default_otp_expiry_secs")]
    pub default_expiry_secs: u64,

    /// Message sent when the caller supplies no template. `{{otp}}` is replaced with the code.
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            default_length: default_otp_length(),
            default_type: default_otp_type(),
            default_expiry_secs: default_otp_expiry_secs(),
            message_template: default_message_template(),
        }
    }
}

fn default_otp_length() -> usize {
    6
}

fn default_otp_type() -> String {
    "numeric".to_string()
}

fn default_otp_expiry_secs() -> u64 {
    300
}

fn default_message_template() -> String {
    "Your WOTP verification code is: *{{otp}}*\n\n\
     This code expires in 5 minutes. Do not share it with anyone."
        .to_string()
}

/// Delivery log retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryLogConfig {
    /// Rows older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for DeliveryLogConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Whether the HTTP gateway is started by `wotp serve`.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// API keys and the account each one authenticates as.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            api_keys: Vec::new(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// A bearer key bound to one account.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub account_id: String,
    pub key: String,
}

impl std::fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("account_id", &self.account_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WotpConfig::default();
        assert_eq!(config.whatsapp.connect_timeout_secs, 120);
        assert_eq!(config.whatsapp.max_reconnect_attempts, 3);
        assert_eq!(config.whatsapp.pairing_wait_secs, 30);
        assert_eq!(config.queue.otp.concurrency, 10);
        assert_eq!(config.queue.message.concurrency, 5);
        assert_eq!(config.queue.otp.warmup_secs, 8);
        assert_eq!(config.queue.message.warmup_secs, 5);
        assert_eq!(config.queue.message.backoff_ms, 3_000);
        assert_eq!(config.delivery_log.retention_days, 90);
        assert!(config.otp.message_template.contains("{{otp}}"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKeyConfig {
            account_id: "acct".into(),
            key: "super-secret".into(),
        };
        let debug = format!("{key:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
