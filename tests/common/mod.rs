#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::macros::datetime;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use shopbell::app::panel::PanelController;
use shopbell::app::sync::{SyncConfig, SyncEngine};
use shopbell::domain::notification::{NotificationKind, NotificationRecord};
use shopbell::infra::memory::InMemoryGateway;
use shopbell::AppState;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub const BASE_TIME: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

/// Unread order notification created `offset_secs` after [`BASE_TIME`].
pub fn notification(user_id: Uuid, offset_secs: i64) -> NotificationRecord {
    NotificationRecord {
        id: Uuid::new_v4(),
        user_id,
        kind: NotificationKind::OrderStatus,
        title: format!("Order update {}", offset_secs),
        message: "Your order has shipped".to_string(),
        payload: Some(json!({ "order_id": format!("ord-{}", offset_secs) })),
        created_at: BASE_TIME + time::Duration::seconds(offset_secs),
        is_read: false,
        read_at: None,
    }
}

pub fn read_notification(user_id: Uuid, offset_secs: i64) -> NotificationRecord {
    let mut record = notification(user_id, offset_secs);
    record.is_read = true;
    record.read_at = Some(record.created_at + time::Duration::minutes(5));
    record
}

// ---------------------------------------------------------------------------
// Engine harness
// ---------------------------------------------------------------------------

pub fn fast_config() -> SyncConfig {
    SyncConfig {
        remote_timeout: Duration::from_secs(2),
        mutation_retry_attempts: 1,
        mutation_retry_backoff: Duration::from_millis(10),
    }
}

pub struct Harness {
    pub gateway: InMemoryGateway,
    pub engine: SyncEngine,
}

pub fn harness() -> Harness {
    harness_with(fast_config())
}

pub fn harness_with(config: SyncConfig) -> Harness {
    let gateway = InMemoryGateway::new();
    let engine = SyncEngine::new(Arc::new(gateway.clone()), config);
    Harness { gateway, engine }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give background tasks a chance to run, for asserting something did NOT happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn assert_counter_consistent(engine: &SyncEngine) {
    let snapshot = engine.snapshot();
    let unread = snapshot.records.iter().filter(|r| !r.is_read).count();
    assert_eq!(snapshot.unread_count, unread, "unread counter drifted from records");
}

pub async fn timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future did not complete in time")
}

// ---------------------------------------------------------------------------
// HTTP harness
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub gateway: InMemoryGateway,
    pub panel: PanelController,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_session_token(None)
    }

    pub fn with_session_token(token: Option<&str>) -> Self {
        let Harness { gateway, engine } = harness();
        let panel = PanelController::new(engine);
        let state = AppState {
            panel: panel.clone(),
            db: None,
            session_hook_token: token.map(str::to_string),
        };
        let router = shopbell::http::router(state);
        TestApp {
            router,
            gateway,
            panel,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[]).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request(Method::POST, path, None, &[]).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None, &[]).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, path, Some(body), &[]).await
    }

    /// Announce `user_id` as the signed-in user.
    pub async fn sign_in(&self, user_id: Uuid) -> TestResponse {
        self.put_json("/v1/session", json!({ "user_id": user_id })).await
    }
}
