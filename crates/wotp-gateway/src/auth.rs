// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key authentication for the gateway.
//!
//! Every request carries `Authorization: Bearer <key>`. The key resolves to
//! the account the request acts for; handlers read it as an [`AccountId`]
//! extension. With no keys configured, all requests are rejected (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use wotp_config::model::ApiKeyConfig;

/// Account resolved from the request's API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountId(pub String);

/// API keys accepted by the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    keys: Arc<HashMap<String, String>>,
}

impl AuthConfig {
    pub fn from_keys(keys: &[ApiKeyConfig]) -> Self {
        Self {
            keys: Arc::new(
                keys.iter()
                    .map(|k| (k.key.clone(), k.account_id.clone()))
                    .collect(),
            ),
        }
    }

    /// Account bound to `key`, if any.
    pub fn account_for(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("keys", &format!("[{} redacted]", self.keys.len()))
            .finish()
    }
}

/// Middleware that maps a bearer API key to its account.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.is_empty() {
        tracing::error!("gateway has no api keys configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let account = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| auth.account_for(token.trim()))
        .map(str::to_string);

    match account {
        Some(account) => {
            request.extensions_mut().insert(AccountId(account));
            Ok(next.run(request).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<ApiKeyConfig> {
        vec![
            ApiKeyConfig {
                account_id: "acct-1".into(),
                key: "wk_0123456789abcdef".into(),
            },
            ApiKeyConfig {
                account_id: "acct-2".into(),
                key: "wk_fedcba9876543210".into(),
            },
        ]
    }

    #[test]
    fn keys_resolve_to_their_account() {
        let auth = AuthConfig::from_keys(&keys());
        assert_eq!(auth.account_for("wk_0123456789abcdef"), Some("acct-1"));
        assert_eq!(auth.account_for("wk_fedcba9876543210"), Some("acct-2"));
        assert_eq!(auth.account_for("acct-1"), None);
        assert!(AuthConfig::default().is_empty());
    }

    #[test]
    fn debug_redacts_keys() {
        let debug_output = format!("{:?}", AuthConfig::from_keys(&keys()));
        assert!(!debug_output.contains("wk_"));
        assert!(debug_output.contains("redacted"));
    }
}
