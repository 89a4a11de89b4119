// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the WOTP session manager.
//!
//! This crate provides the trait definitions, error type, and common types
//! shared by storage, the session supervisor, the outbound queue, and the
//! HTTP gateway. Transport and storage backends implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::WotpError;
pub use types::{
    AdapterType, CloseClass, CloseReason, CoarseStatus, ConnectionSummary, CredentialBatch,
    CredentialUpdate, DeliveryStatus, HealthStatus, JobKind, LinkedIdentity, LiveStatus,
    PairingEvent, Phase, RecordType, SessionKey, TransportEvent, DEFAULT_LABEL,
    SINGLETON_RECORD_ID,
};

pub use traits::{
    AuthState, ConnectionStore, CredentialStore, PluginAdapter, SignalKeyStore, StorageAdapter,
    TransportConnection, TransportFactory, TransportHandle,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wotp_error_has_all_variants() {
        let _config = WotpError::Config("test".into());
        let _storage = WotpError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transport = WotpError::transport("test");
        let _not_found = WotpError::SessionNotFound {
            session: "a:default".into(),
        };
        let _input = WotpError::InvalidInput("test".into());
        let _queue = WotpError::Queue("test".into());
        let _timeout = WotpError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = WotpError::Internal("test".into());
    }

    #[test]
    fn not_connected_message_is_recognizable() {
        let err = WotpError::NotConnected {
            session: "a:default".into(),
            status: LiveStatus::Disconnected.to_string(),
        };
        assert!(err.is_not_connected());
        assert!(err.to_string().contains("not connected"));
        assert!(!WotpError::transport("boom").is_not_connected());
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Transport, AdapterType::Gateway] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_credential_store<T: CredentialStore>() {}
        fn _assert_connection_store<T: ConnectionStore>() {}
        fn _assert_transport_factory<T: TransportFactory>() {}
        fn _assert_transport_handle<T: TransportHandle>() {}
        fn _assert_key_store<T: SignalKeyStore>() {}
    }
}
