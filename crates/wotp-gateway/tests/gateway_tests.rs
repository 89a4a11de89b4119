// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes driven through `tower::ServiceExt::oneshot`.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use wotp_config::model::ApiKeyConfig;
use wotp_core::{CloseReason, DeliveryStatus, LiveStatus, SessionKey};
use wotp_gateway::{router, AuthConfig, GatewayState};
use wotp_queue::Outbox;
use wotp_storage::queries::delivery_log;
use wotp_test_utils::TestHarness;
use wotp_whatsapp::{Notifier, SessionRegistry, SessionSupervisor, SupervisorSettings};

const KEY_1: &str = "wk_acct1_0123456789";
const KEY_2: &str = "wk_acct2_0123456789";

struct Fixture {
    harness: TestHarness,
    supervisor: SessionSupervisor,
    app: Router,
}

async fn fixture_with_wait(pairing_wait: Duration) -> Fixture {
    let harness = TestHarness::builder()
        .with_config(|c| {
            c.gateway.api_keys = vec![
                ApiKeyConfig {
                    account_id: "acct-1".into(),
                    key: KEY_1.into(),
                },
                ApiKeyConfig {
                    account_id: "acct-2".into(),
                    key: KEY_2.into(),
                },
            ];
        })
        .build()
        .await
        .unwrap();
    let supervisor = SessionSupervisor::new(
        SessionRegistry::new(),
        harness.storage.clone(),
        harness.storage.clone(),
        Notifier::new(),
        harness.transport.clone(),
        SupervisorSettings::default(),
    );
    let state = GatewayState {
        supervisor: supervisor.clone(),
        connections: harness.storage.clone(),
        outbox: Outbox::new(harness.database().clone(), &harness.config.queue),
        otp: harness.config.otp.clone(),
        pairing_wait,
        auth: AuthConfig::from_keys(&harness.config.gateway.api_keys),
        started_at: Instant::now(),
    };
    Fixture {
        harness,
        supervisor,
        app: router(state),
    }
}

async fn fixture() -> Fixture {
    fixture_with_wait(Duration::from_secs(5)).await
}

fn request(method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn wait_for_status(sup: &SessionSupervisor, key: &SessionKey, status: LiveStatus) {
    for _ in 0..300 {
        if sup.status(key).await == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {key} never reached {status}");
}

async fn link(f: &Fixture, key: &SessionKey) {
    f.supervisor.start_session(key).await.unwrap();
    f.harness
        .transport
        .latest(key)
        .unwrap()
        .open_as("15550001", Some("Ada"))
        .await;
    wait_for_status(&f.supervisor, key, LiveStatus::Connected).await;
}

#[tokio::test]
async fn health_is_public() {
    let f = fixture().await;
    let (status, body) = call(&f.app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn api_routes_require_a_known_key() {
    let f = fixture().await;
    let (status, _) = call(&f.app, request("GET", "/v1/sessions", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(
        &f.app,
        request("GET", "/v1/sessions", Some("wk_unknown_000000"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = call(&f.app, request("GET", "/v1/sessions", Some(KEY_1), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"], json!([]));
}

#[tokio::test]
async fn connect_long_polls_for_the_pairing_code() {
    let f = fixture().await;
    let key = SessionKey::default_for("acct-1");

    let transport = f.harness.transport.clone();
    let driver_key = key.clone();
    tokio::spawn(async move {
        for _ in 0..300 {
            if let Some(conn) = transport.latest(&driver_key) {
                conn.pairing_code("WOTP-1234").await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let (status, body) = call(
        &f.app,
        request("POST", "/v1/sessions/default/connect", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pairing");
    assert_eq!(body["pairing_code"], "WOTP-1234");

    let (_, body) = call(&f.app, request("GET", "/v1/sessions", Some(KEY_1), None)).await;
    assert_eq!(body["sessions"][0]["label"], "default");
    assert_eq!(body["sessions"][0]["status"], "connecting");
}

#[tokio::test]
async fn connect_answers_immediately_when_connected() {
    let f = fixture().await;
    let key = SessionKey::new("acct-1", "support");
    link(&f, &key).await;

    let (status, body) = call(
        &f.app,
        request("POST", "/v1/sessions/support/connect", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "connected");
    assert_eq!(f.harness.transport.open_count_for(&key), 1);
}

#[tokio::test]
async fn connect_times_out_without_an_outcome() {
    let f = fixture_with_wait(Duration::from_millis(100)).await;
    let (status, body) = call(
        &f.app,
        request("POST", "/v1/sessions/default/connect", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("pairing code"));
}

#[tokio::test]
async fn connect_rejects_bad_labels() {
    let f = fixture().await;
    let (status, _) = call(
        &f.app,
        request("POST", "/v1/sessions/a:b/connect", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(f.harness.transport.open_count(), 0);
}

#[tokio::test]
async fn disconnect_removes_a_known_session() {
    let f = fixture().await;
    let (status, _) = call(
        &f.app,
        request("DELETE", "/v1/sessions/default", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let key = SessionKey::default_for("acct-1");
    link(&f, &key).await;
    let (status, body) = call(
        &f.app,
        request("DELETE", "/v1/sessions/default", Some(KEY_1), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disconnected");
    assert_eq!(f.supervisor.status(&key).await, LiveStatus::Unknown);

    let (_, body) = call(&f.app, request("GET", "/v1/sessions", Some(KEY_1), None)).await;
    assert_eq!(body["sessions"][0]["status"], "disconnected");
    assert_eq!(body["sessions"][0]["phone"], "15550001");
}

#[tokio::test]
async fn sessions_are_scoped_to_the_key_account() {
    let f = fixture().await;
    link(&f, &SessionKey::default_for("acct-1")).await;

    let (_, body) = call(&f.app, request("GET", "/v1/sessions", Some(KEY_2), None)).await;
    assert_eq!(body["sessions"], json!([]));
    let (status, _) = call(
        &f.app,
        request("DELETE", "/v1/sessions/default", Some(KEY_2), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn messages_are_logged_and_queued() {
    let f = fixture().await;
    let (status, body) = call(
        &f.app,
        request(
            "POST",
            "/v1/messages",
            Some(KEY_1),
            Some(json!({"phone": "+15550100200", "content": "Your order shipped"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");

    let log_id = body["log_id"].as_i64().unwrap();
    let row = delivery_log::get(f.harness.database(), log_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.account_id, "acct-1");
    assert_eq!(row.label, "default");
    assert_eq!(row.status, DeliveryStatus::Pending);
    assert_eq!(row.content.as_deref(), Some("Your order shipped"));
}

#[tokio::test]
async fn message_validation() {
    let f = fixture().await;
    for body in [
        json!({"phone": "555", "content": "hi"}),
        json!({"phone": "+15550100200", "content": ""}),
        json!({"phone": "+15550100200", "content": "x".repeat(2049)}),
        json!({"phone": "+15550100200", "content": "hi", "label": "no spaces"}),
    ] {
        let (status, _) = call(
            &f.app,
            request("POST", "/v1/messages", Some(KEY_1), Some(body)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn otp_is_generated_and_queued() {
    let f = fixture().await;
    let (status, body) = call(
        &f.app,
        request(
            "POST",
            "/v1/otp",
            Some(KEY_1),
            Some(json!({"phone": "15550100200", "length": 8, "type": "alpha"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let code = body["otp"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase()));
    assert_eq!(body["expires_in"], 300);

    let row = delivery_log::get(f.harness.database(), body["log_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, DeliveryStatus::Pending);
    assert!(row.content.is_none());

    let (_, body) = call(
        &f.app,
        request("POST", "/v1/otp", Some(KEY_1), Some(json!({"phone": "15550100200"}))),
    )
    .await;
    let code = body["otp"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn otp_validation() {
    let f = fixture().await;
    for body in [
        json!({"phone": "15550100200", "type": "hex"}),
        json!({"phone": "15550100200", "length": 3}),
        json!({"phone": "15550100200", "length": 13}),
        json!({"phone": "15550100200", "expires_in": 10}),
        json!({"phone": "15550100200", "message": "no placeholder"}),
    ] {
        let (status, _) = call(&f.app, request("POST", "/v1/otp", Some(KEY_1), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn sends_through_a_dropped_session_are_refused() {
    let f = fixture().await;
    let key = SessionKey::default_for("acct-1");
    link(&f, &key).await;
    f.harness
        .transport
        .latest(&key)
        .unwrap()
        .close_with(CloseReason::logged_out())
        .await;
    wait_for_status(&f.supervisor, &key, LiveStatus::Disconnected).await;

    let (status, body) = call(
        &f.app,
        request(
            "POST",
            "/v1/messages",
            Some(KEY_1),
            Some(json!({"phone": "15550100200", "content": "hi"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not connected"));
}
