// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect policy and supervisor timing knobs.

use std::time::Duration;

use wotp_config::model::WhatsAppConfig;
use wotp_core::CloseClass;

/// Error reason published when the reconnect budget is spent.
pub const REASON_MAX_ATTEMPTS: &str = "max reconnection attempts reached";
/// Error reason published when the linked device was logged out.
pub const REASON_UNAUTHORIZED: &str = "session unauthorized";
/// Error reason for bans and for sessions stuck connecting.
pub const REASON_FAILED: &str = "connection failed permanently";

/// Exponential reconnect backoff with a hard attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5_000),
            max: Duration::from_millis(30_000),
            max_attempts: 3,
        }
    }
}

/// What to do after a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Reconnect { delay: Duration },
    Terminal { reason: &'static str },
}

impl ReconnectPolicy {
    /// `min(base * 2^(attempt-1), max)` for a 1-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << exp).min(self.max)
    }

    /// Decides after the `attempts`-th consecutive close without an open.
    ///
    /// The attempt cap wins over the close class when both apply.
    pub fn decide(&self, class: CloseClass, attempts: u32) -> CloseDecision {
        if attempts >= self.max_attempts {
            return CloseDecision::Terminal {
                reason: REASON_MAX_ATTEMPTS,
            };
        }
        match class {
            CloseClass::Unauthorized => CloseDecision::Terminal {
                reason: REASON_UNAUTHORIZED,
            },
            CloseClass::Forbidden => CloseDecision::Terminal {
                reason: REASON_FAILED,
            },
            CloseClass::Other => CloseDecision::Reconnect {
                delay: self.delay_for(attempts),
            },
        }
    }
}

/// Timing settings of the session supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// A session still connecting after this long is torn down.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub send_attempts: u32,
    pub send_retry_delay: Duration,
    pub connecting_grace: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(120),
            reconnect: ReconnectPolicy::default(),
            send_attempts: 3,
            send_retry_delay: Duration::from_millis(2_000),
            connecting_grace: Duration::from_millis(3_000),
        }
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            reconnect: ReconnectPolicy {
                base: Duration::from_millis(config.reconnect_base_ms),
                max: Duration::from_millis(config.reconnect_max_ms),
                max_attempts: config.max_reconnect_attempts,
            },
            send_attempts: config.send_attempts.max(1),
            send_retry_delay: Duration::from_millis(config.send_retry_delay_ms),
            connecting_grace: Duration::from_millis(config.connecting_grace_ms),
        }
    }
}
