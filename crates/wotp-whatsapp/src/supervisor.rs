// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session connection lifecycle.
//!
//! Every `(account, label)` key owns a [`SessionSlot`] behind its own async
//! mutex. All phase, attempt and task bookkeeping for a key happens under
//! that lock, so events of one session are handled strictly in order while
//! different sessions proceed in parallel.
//!
//! Each opened connection carries a generation number. Timers, watchdogs and
//! event pumps remember the generation they were spawned for and become
//! no-ops once the slot moved on, so a late event from a replaced connection
//! can never tear down its successor.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wotp_core::{
    AuthState, CloseReason, CoarseStatus, ConnectionStore, CredentialStore, LinkedIdentity,
    LiveStatus, PairingEvent, Phase, SessionKey, TransportEvent, TransportFactory,
    TransportHandle, WotpError,
};

use crate::credentials::SessionCredentials;
use crate::jid::recipient_jid;
use crate::notifier::{pairing_topic, Notifier, Subscription};
use crate::policy::{CloseDecision, SupervisorSettings, REASON_FAILED};

/// Mutable state of one session key.
pub struct SessionSlot {
    phase: Phase,
    handle: Option<Arc<dyn TransportHandle>>,
    /// A transport open is in flight.
    opening: bool,
    /// Consecutive closes since the last successful open.
    attempts: u32,
    generation: u64,
    /// Set once the slot left the registry; holders must look up again.
    removed: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            phase: Phase::Closed,
            handle: None,
            opening: false,
            attempts: 0,
            generation: 0,
            removed: false,
            reconnect_timer: None,
            watchdog: None,
            pump: None,
        }
    }

    fn is_live(&self) -> bool {
        self.handle.is_some() || self.opening
    }

    fn abort_tasks(&mut self) {
        for task in [
            self.reconnect_timer.take(),
            self.watchdog.take(),
            self.pump.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

type SlotRef = Arc<Mutex<SessionSlot>>;

/// Shared map of session slots, injected into the supervisor.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<DashMap<SessionKey, SlotRef>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &SessionKey) -> Option<SlotRef> {
        self.slots.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn get_or_insert(&self, key: &SessionKey) -> SlotRef {
        let entry = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionSlot::new())));
        Arc::clone(entry.value())
    }

    fn remove(&self, key: &SessionKey, slot: &SlotRef) {
        self.slots.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    fn snapshot(&self) -> Vec<(SessionKey, SlotRef)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        self.slots.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartCause {
    Request,
    Reconnect,
}

struct Inner {
    registry: SessionRegistry,
    credentials: Arc<dyn CredentialStore>,
    connections: Arc<dyn ConnectionStore>,
    notifier: Notifier,
    transport: Arc<dyn TransportFactory>,
    settings: SupervisorSettings,
}

/// Owns every WhatsApp connection of the process.
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

impl SessionSupervisor {
    pub fn new(
        registry: SessionRegistry,
        credentials: Arc<dyn CredentialStore>,
        connections: Arc<dyn ConnectionStore>,
        notifier: Notifier,
        transport: Arc<dyn TransportFactory>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                credentials,
                connections,
                notifier,
                transport,
                settings,
            }),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.inner.settings
    }

    /// Subscribes to the pairing topic of `key`.
    pub fn subscribe(&self, key: &SessionKey) -> Subscription {
        self.inner.notifier.subscribe(&pairing_topic(key))
    }

    /// Opens a connection for `key` unless one is already live or opening.
    ///
    /// A failed transport open is handled like a close with reason *other*
    /// and does not surface as an error here.
    pub async fn start_session(&self, key: &SessionKey) -> Result<(), WotpError> {
        self.start(key.clone(), StartCause::Request).await
    }

    // Boxed: the reconnect timer spawned from `apply_close` awaits `start`
    // again, and the recursive future needs a nameable `Send` type.
    fn start(&self, key: SessionKey, cause: StartCause) -> BoxFuture<'_, Result<(), WotpError>> {
        Box::pin(async move {
            loop {
                let slot = match cause {
                    StartCause::Request => self.inner.registry.get_or_insert(&key),
                    StartCause::Reconnect => match self.inner.registry.get(&key) {
                        Some(slot) => slot,
                        None => {
                            debug!(session = %key, "session stopped, skipping reconnect");
                            return Ok(());
                        }
                    },
                };

                let mut s = slot.lock().await;
                if s.removed {
                    drop(s);
                    if cause == StartCause::Reconnect {
                        return Ok(());
                    }
                    continue;
                }
                if s.is_live() {
                    info!(session = %key, phase = %s.phase, "session already live, start ignored");
                    return Ok(());
                }

                match cause {
                    // Runs inside the timer task itself.
                    StartCause::Reconnect => drop(s.reconnect_timer.take()),
                    StartCause::Request => {
                        if let Some(timer) = s.reconnect_timer.take() {
                            timer.abort();
                        }
                    }
                }
                s.generation += 1;
                s.opening = true;
                s.phase = Phase::Connecting;
                if let Some(watchdog) = s.watchdog.take() {
                    watchdog.abort();
                }
                s.watchdog = Some(self.spawn_watchdog(key.clone(), Arc::clone(&slot), s.generation));
                let generation = s.generation;
                info!(session = %key, attempt = s.attempts + 1, "opening session");
                self.persist_status(&key, CoarseStatus::Connecting).await;
                drop(s);

                self.open_connection(key, slot, generation).await;
                return Ok(());
            }
        })
    }

    async fn open_connection(&self, key: SessionKey, slot: SlotRef, generation: u64) {
        let credentials = self.session_credentials(&key);
        let auth = AuthState {
            identity: credentials.identity().await,
            keys: Arc::new(credentials),
        };
        let opened = self.inner.transport.open(&key, auth).await;

        let mut s = slot.lock().await;
        if s.removed || s.generation != generation {
            drop(s);
            debug!(session = %key, "session changed while opening, discarding connection");
            if let Ok(conn) = opened {
                conn.handle.close().await;
            }
            return;
        }
        s.opening = false;
        match opened {
            Ok(conn) => {
                debug!(session = %key, generation, "transport connection opened");
                s.handle = Some(conn.handle);
                s.pump = Some(self.spawn_pump(key, Arc::clone(&slot), generation, conn.events));
            }
            Err(e) => {
                warn!(session = %key, error = %e, "transport open failed");
                let reason = CloseReason::other(format!("open failed: {e}"));
                self.apply_close(&key, &mut s, reason).await;
            }
        }
    }

    fn spawn_pump(
        &self,
        key: SessionKey,
        slot: SlotRef,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::PairingCode(code) => {
                        info!(session = %key, "pairing code issued");
                        this.inner
                            .notifier
                            .publish(&pairing_topic(&key), PairingEvent::PairingCode { code });
                    }
                    TransportEvent::Open(identity) => {
                        this.on_open(&key, &slot, generation, identity).await;
                    }
                    TransportEvent::Closed(reason) => {
                        this.on_close(&key, &slot, generation, reason).await;
                        return;
                    }
                    // Applied in order before the next event, so a later
                    // close or wipe never races an older batch.
                    TransportEvent::CredentialsUpdated(batch) => {
                        this.session_credentials(&key).apply(batch).await;
                    }
                }
            }
            this.on_close(&key, &slot, generation, CloseReason::other("event stream ended"))
                .await;
        })
    }

    async fn on_open(
        &self,
        key: &SessionKey,
        slot: &SlotRef,
        generation: u64,
        identity: LinkedIdentity,
    ) {
        let mut s = slot.lock().await;
        if s.removed || s.generation != generation || s.handle.is_none() {
            return;
        }
        s.phase = Phase::Open;
        s.attempts = 0;
        for task in [s.reconnect_timer.take(), s.watchdog.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        info!(session = %key, phone = %identity.phone, "session connected");
        if let Err(e) = self
            .inner
            .connections
            .set_identity(key, &identity.phone, identity.name.as_deref())
            .await
        {
            warn!(session = %key, error = %e, "failed to persist linked identity");
        }
        self.persist_status(key, CoarseStatus::Connected).await;
        self.inner
            .notifier
            .publish(&pairing_topic(key), PairingEvent::Connected);
    }

    async fn on_close(
        &self,
        key: &SessionKey,
        slot: &SlotRef,
        generation: u64,
        reason: CloseReason,
    ) {
        let mut s = slot.lock().await;
        if s.removed || s.generation != generation || !s.is_live() {
            debug!(session = %key, "ignoring close of a replaced connection");
            return;
        }
        // The pump calling us is finishing on its own.
        drop(s.pump.take());
        self.apply_close(key, &mut s, reason).await;
    }

    async fn apply_close(&self, key: &SessionKey, s: &mut SessionSlot, reason: CloseReason) {
        s.phase = Phase::Closed;
        s.handle = None;
        s.opening = false;
        s.attempts += 1;
        if let Some(watchdog) = s.watchdog.take() {
            watchdog.abort();
        }

        match self.inner.settings.reconnect.decide(reason.class(), s.attempts) {
            CloseDecision::Reconnect { delay } => {
                info!(
                    session = %key,
                    reason = %reason,
                    attempt = s.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "connection closed, reconnecting"
                );
                if let Some(timer) = s.reconnect_timer.take() {
                    timer.abort();
                }
                let this = self.clone();
                let key_owned = key.clone();
                s.reconnect_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = this.start(key_owned.clone(), StartCause::Reconnect).await {
                        warn!(session = %key_owned, error = %e, "reconnect failed");
                    }
                }));
                self.persist_status(key, CoarseStatus::Connecting).await;
            }
            CloseDecision::Terminal { reason: outcome } => {
                warn!(session = %key, reason = %reason, outcome, "connection closed for good");
                self.teardown(key, s, outcome).await;
            }
        }
    }

    /// Terminal teardown: wipes credentials and tells subscribers why.
    async fn teardown(&self, key: &SessionKey, s: &mut SessionSlot, reason: &str) {
        s.attempts = 0;
        if let Some(timer) = s.reconnect_timer.take() {
            timer.abort();
        }
        let wiped = self.session_credentials(key).wipe().await;
        debug!(session = %key, wiped, "credentials wiped");
        self.persist_status(key, CoarseStatus::Disconnected).await;
        self.inner.notifier.publish(
            &pairing_topic(key),
            PairingEvent::Error {
                reason: reason.to_string(),
            },
        );
    }

    fn spawn_watchdog(&self, key: SessionKey, slot: SlotRef, generation: u64) -> JoinHandle<()> {
        let this = self.clone();
        let timeout = self.inner.settings.connect_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            this.on_watchdog(&key, &slot, generation).await;
        })
    }

    async fn on_watchdog(&self, key: &SessionKey, slot: &SlotRef, generation: u64) {
        let mut s = slot.lock().await;
        if s.removed || s.generation != generation || s.phase != Phase::Connecting {
            return;
        }
        warn!(
            session = %key,
            timeout_secs = self.inner.settings.connect_timeout.as_secs(),
            "session stuck connecting, tearing down"
        );
        drop(s.watchdog.take());
        s.generation += 1;
        s.opening = false;
        s.phase = Phase::Closed;
        if let Some(pump) = s.pump.take() {
            pump.abort();
        }
        if let Some(handle) = s.handle.take() {
            handle.close().await;
        }
        self.teardown(key, &mut s, REASON_FAILED).await;
    }

    /// Logs the device out and forgets the session.
    ///
    /// Logout errors are swallowed; credentials are wiped either way.
    pub async fn stop_session(&self, key: &SessionKey) -> Result<(), WotpError> {
        let slot = self.inner.registry.get(key);
        let mut guard = match &slot {
            Some(slot) => Some(slot.lock().await),
            None => None,
        };
        if let Some(s) = guard.as_deref_mut() {
            s.removed = true;
            s.generation += 1;
            s.opening = false;
            s.phase = Phase::Closed;
            s.abort_tasks();
            if let Some(handle) = s.handle.take() {
                if let Err(e) = handle.logout().await {
                    debug!(session = %key, error = %e, "logout failed, continuing");
                }
            }
        }

        let wiped = self.session_credentials(key).wipe().await;
        self.persist_status(key, CoarseStatus::Disconnected).await;
        if let Some(slot) = &slot {
            self.inner.registry.remove(key, slot);
        }
        drop(guard);
        info!(session = %key, wiped, "session stopped");
        Ok(())
    }

    /// Sends a text message through the session's live connection.
    pub async fn send(
        &self,
        key: &SessionKey,
        recipient: &str,
        body: &str,
    ) -> Result<(), WotpError> {
        let jid = recipient_jid(recipient)?;
        let attempts = self.inner.settings.send_attempts.max(1);
        let mut graced = false;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let (mut phase, mut handle) = match self.live_handle(key).await {
                (phase, Some(handle)) => (phase, handle),
                (status, None) => return Err(not_connected(key, status)),
            };

            if phase == Phase::Connecting && !graced {
                graced = true;
                debug!(session = %key, "session connecting, waiting before send");
                tokio::time::sleep(self.inner.settings.connecting_grace).await;
                match self.live_handle(key).await {
                    (p, Some(h)) => {
                        phase = p;
                        handle = h;
                    }
                    (status, None) => return Err(not_connected(key, status)),
                }
            }

            let result = if phase == Phase::Open {
                handle.send_text(&jid, body).await
            } else {
                Err(not_connected(key, phase))
            };
            match result {
                Ok(()) => {
                    info!(session = %key, attempt, "message sent");
                    return Ok(());
                }
                Err(e) => {
                    warn!(session = %key, attempt, error = %e, "send attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.inner.settings.send_retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| not_connected(key, Phase::Closed)))
    }

    async fn live_handle(&self, key: &SessionKey) -> (Phase, Option<Arc<dyn TransportHandle>>) {
        match self.inner.registry.get(key) {
            Some(slot) => {
                let s = slot.lock().await;
                if s.removed {
                    (Phase::Closed, None)
                } else {
                    (s.phase, s.handle.clone())
                }
            }
            None => (Phase::Closed, None),
        }
    }

    /// In-memory status of `key`; `Unknown` when the supervisor holds no entry.
    pub async fn status(&self, key: &SessionKey) -> LiveStatus {
        match self.inner.registry.get(key) {
            Some(slot) => {
                let s = slot.lock().await;
                if s.removed {
                    LiveStatus::Unknown
                } else {
                    s.phase.live_status()
                }
            }
            None => LiveStatus::Unknown,
        }
    }

    /// Starts every session persisted as connected or connecting.
    pub async fn restore_persisted(&self) -> Result<usize, WotpError> {
        let summaries = self.inner.connections.list_summaries(None).await?;
        let mut started = 0;
        for summary in summaries.into_iter().filter(|s| s.status.is_restorable()) {
            let key = summary.key();
            match self.start_session(&key).await {
                Ok(()) => started += 1,
                Err(e) => warn!(session = %key, error = %e, "failed to restore session"),
            }
        }
        info!(started, "persisted sessions restored");
        Ok(started)
    }

    /// Drops every connection without logging out, keeping credentials for
    /// the next boot.
    pub async fn shutdown(&self) {
        for (key, slot) in self.inner.registry.snapshot() {
            let mut s = slot.lock().await;
            s.removed = true;
            s.generation += 1;
            s.abort_tasks();
            if let Some(handle) = s.handle.take() {
                handle.close().await;
            }
            self.inner.registry.remove(&key, &slot);
            debug!(session = %key, "session released");
        }
        info!("session supervisor shut down");
    }

    fn session_credentials(&self, key: &SessionKey) -> SessionCredentials {
        SessionCredentials::new(key.clone(), Arc::clone(&self.inner.credentials))
    }

    async fn persist_status(&self, key: &SessionKey, status: CoarseStatus) {
        if let Err(e) = self.inner.connections.set_status(key, status).await {
            warn!(session = %key, error = %e, "failed to persist session status");
        }
        if key.is_default()
            && let Err(e) = self
                .inner
                .connections
                .set_account_status(&key.account_id, status)
                .await
        {
            warn!(account = %key.account_id, error = %e, "failed to persist account status");
        }
    }
}

fn not_connected(key: &SessionKey, phase: Phase) -> WotpError {
    WotpError::NotConnected {
        session: key.to_string(),
        status: phase.live_status().to_string(),
    }
}
