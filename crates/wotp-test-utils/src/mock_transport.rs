// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock WhatsApp transport for deterministic testing.
//!
//! `MockTransportFactory` records every opened connection. Tests drive a
//! connection by pushing [`TransportEvent`]s through its [`MockConnection`]
//! and inspect what the supervisor sent through [`MockTransport`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use wotp_core::{
    AdapterType, AuthState, CloseReason, HealthStatus, LinkedIdentity, PluginAdapter, SessionKey,
    TransportConnection, TransportEvent, TransportFactory, TransportHandle, WotpError,
};

const EVENT_BUFFER: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A message captured by [`MockTransport::send_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub jid: String,
    pub text: String,
}

/// Control handle of one mock connection.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    send_failures: AtomicU32,
    send_attempts: AtomicU32,
    logouts: AtomicU32,
    closes: AtomicU32,
    fail_logout: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` sends fail with a transport error.
    pub fn fail_next_sends(&self, n: u32) {
        self.send_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Successfully sent messages, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Every send call, including failed ones.
    pub fn send_attempts(&self) -> u32 {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> u32 {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportHandle for MockTransport {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), WotpError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .send_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WotpError::transport("mock send failure"));
        }
        lock(&self.sent).push(SentMessage {
            jid: jid.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn logout(&self) -> Result<(), WotpError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(WotpError::transport("mock logout failure"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test-side view of a connection opened through the mock factory.
#[derive(Clone)]
pub struct MockConnection {
    pub key: SessionKey,
    pub transport: Arc<MockTransport>,
    pub auth: AuthState,
    events: mpsc::Sender<TransportEvent>,
}

impl MockConnection {
    /// Pushes an event to the supervisor. Returns `false` once the pump is gone.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    pub async fn pairing_code(&self, code: &str) -> bool {
        self.emit(TransportEvent::PairingCode(code.to_string())).await
    }

    /// Reports the connection open as the given phone number.
    pub async fn open_as(&self, phone: &str, name: Option<&str>) -> bool {
        let identity =
            LinkedIdentity::from_jid(format!("{phone}:1@s.whatsapp.net"), name.map(str::to_string));
        self.emit(TransportEvent::Open(identity)).await
    }

    pub async fn close_with(&self, reason: CloseReason) -> bool {
        self.emit(TransportEvent::Closed(reason)).await
    }

    pub fn is_pump_alive(&self) -> bool {
        !self.events.is_closed()
    }
}

#[derive(Default)]
struct FactoryState {
    connections: Vec<MockConnection>,
    open_failures: VecDeque<String>,
}

/// A transport factory whose connections are scripted by the test.
#[derive(Default)]
pub struct MockTransportFactory {
    state: Mutex<FactoryState>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next open fail with `reason`. Calls queue up.
    pub fn fail_next_open(&self, reason: &str) {
        lock(&self.state).open_failures.push_back(reason.to_string());
    }

    /// Total successful opens across all sessions.
    pub fn open_count(&self) -> usize {
        lock(&self.state).connections.len()
    }

    /// Successful opens for one session.
    pub fn open_count_for(&self, key: &SessionKey) -> usize {
        lock(&self.state)
            .connections
            .iter()
            .filter(|c| &c.key == key)
            .count()
    }

    /// The most recent connection opened for `key`.
    pub fn latest(&self, key: &SessionKey) -> Option<MockConnection> {
        lock(&self.state)
            .connections
            .iter()
            .rev()
            .find(|c| &c.key == key)
            .cloned()
    }
}

#[async_trait]
impl PluginAdapter for MockTransportFactory {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, WotpError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WotpError> {
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn open(
        &self,
        key: &SessionKey,
        auth: AuthState,
    ) -> Result<TransportConnection, WotpError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.open_failures.pop_front() {
            return Err(WotpError::transport(reason));
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let transport = Arc::new(MockTransport::new());
        state.connections.push(MockConnection {
            key: key.clone(),
            transport: Arc::clone(&transport),
            auth,
            events: tx,
        });
        Ok(TransportConnection {
            handle: transport,
            events: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wotp_core::{CredentialBatch, RecordType, SignalKeyStore};

    struct NoKeys;

    #[async_trait]
    impl SignalKeyStore for NoKeys {
        async fn get(
            &self,
            _record_type: RecordType,
            _ids: &[String],
        ) -> Result<HashMap<String, Vec<u8>>, WotpError> {
            Ok(HashMap::new())
        }

        async fn set(&self, _batch: CredentialBatch) -> Result<(), WotpError> {
            Ok(())
        }
    }

    fn auth() -> AuthState {
        AuthState {
            identity: None,
            keys: Arc::new(NoKeys),
        }
    }

    #[tokio::test]
    async fn scripted_failures_then_success() {
        let factory = MockTransportFactory::new();
        let key = SessionKey::default_for("a");
        factory.fail_next_open("refused");
        assert!(factory.open(&key, auth()).await.is_err());

        let mut conn = factory.open(&key, auth()).await.unwrap();
        assert_eq!(factory.open_count_for(&key), 1);

        let mock = factory.latest(&key).unwrap();
        assert!(mock.pairing_code("ABCD-EFGH").await);
        assert_eq!(
            conn.events.recv().await,
            Some(TransportEvent::PairingCode("ABCD-EFGH".into()))
        );

        mock.transport.fail_next_sends(1);
        assert!(conn.handle.send_text("1@s.whatsapp.net", "hi").await.is_err());
        conn.handle.send_text("1@s.whatsapp.net", "hi").await.unwrap();
        assert_eq!(mock.transport.send_attempts(), 2);
        assert_eq!(mock.transport.sent().len(), 1);
    }
}
