// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wotp config` command implementation.

use wotp_config::WotpConfig;
use wotp_core::WotpError;

const REDACTED: &str = "[REDACTED]";

/// Prints the effective configuration.
pub fn run_config(config: &WotpConfig) -> Result<(), WotpError> {
    print!("{}", render_config(config)?);
    Ok(())
}

/// Serializes `config` as TOML with API keys redacted.
pub fn render_config(config: &WotpConfig) -> Result<String, WotpError> {
    let mut shown = config.clone();
    for api_key in &mut shown.gateway.api_keys {
        api_key.key = REDACTED.to_string();
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| WotpError::Internal(format!("failed to render configuration: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wotp_config::model::ApiKeyConfig;

    #[test]
    fn rendered_config_round_trips_and_hides_keys() {
        let mut config = WotpConfig::default();
        config.gateway.api_keys = vec![ApiKeyConfig {
            account_id: "acct".into(),
            key: "wk_supersecret_0001".into(),
        }];
        config.whatsapp.bridge_url = Some("ws://127.0.0.1:9100".into());

        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("wk_supersecret_0001"));
        assert!(rendered.contains(REDACTED));

        let parsed = wotp_config::load_config_from_str(&rendered).unwrap();
        assert_eq!(parsed.whatsapp.bridge_url.as_deref(), Some("ws://127.0.0.1:9100"));
        assert_eq!(parsed.gateway.api_keys[0].account_id, "acct");
        assert_eq!(parsed.queue.otp.concurrency, config.queue.otp.concurrency);
    }
}
