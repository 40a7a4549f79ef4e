// API client tests
// Author: kelexine (https://github.com/kelexine)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use session_recovery::client::ApiClient;
use session_recovery::error::RequestError;
use session_recovery::events::AuthEventBus;
use session_recovery::retry::RetryConfig;
use session_recovery::session::memory::{
    MemoryCookieJar, MemorySessionStore, MemoryStorage, Navigation, RecordingNavigator,
};
use session_recovery::session::provider::HttpSignOut;
use session_recovery::session::{
    KeyValueStorage, SessionGuard, SessionProvider, SignOutOptions, TeardownCollaborators,
    TeardownSettings, TeardownState, TokenInspector,
};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Sign-out that blocks until the test opens the gate.
struct GatedSignOut {
    gate: Semaphore,
}

#[async_trait::async_trait]
impl SessionProvider for GatedSignOut {
    async fn sign_out(&self, _options: SignOutOptions) -> anyhow::Result<()> {
        let _permit = self.gate.acquire().await?;
        Ok(())
    }
}

struct Stack {
    client: ApiClient,
    guard: SessionGuard,
    storage: Arc<MemoryStorage>,
    navigator: Arc<RecordingNavigator>,
}

/// Client, bus and guard wired the way the binary wires them.
fn stack(base_url: &str, max_retries: u32) -> Stack {
    let provider = Arc::new(HttpSignOut::new(Client::new(), base_url, "/api/auth/signout"));
    stack_with_provider(base_url, max_retries, provider)
}

fn stack_with_provider(
    base_url: &str,
    max_retries: u32,
    provider: Arc<dyn SessionProvider>,
) -> Stack {
    let http = Client::new();
    let inspector = Arc::new(TokenInspector::new());
    let storage = Arc::new(MemoryStorage::new("local"));
    let navigator = Arc::new(RecordingNavigator::new());

    let guard = SessionGuard::new(
        TeardownSettings::default(),
        TeardownCollaborators {
            session_store: Arc::new(MemorySessionStore::new()),
            storages: vec![storage.clone() as Arc<dyn KeyValueStorage>],
            cookie_jar: Arc::new(MemoryCookieJar::new()),
            provider,
            navigator: navigator.clone(),
        },
        inspector.clone(),
    );

    let bus = Arc::new(AuthEventBus::new());
    guard.attach(&bus);

    let retry = RetryConfig::new(max_retries, 1, 5).unwrap();
    let client = ApiClient::with_client(http, base_url, retry, bus, inspector);

    Stack {
        client,
        guard,
        storage,
        navigator,
    }
}

#[tokio::test]
async fn test_success_returns_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/items")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items":[1,2,3]}"#)
        .expect(1)
        .create_async()
        .await;

    let s = stack(&server.url(), 3);
    let body: Value = s.client.get_json("/api/items").await.unwrap();

    assert_eq!(body, json!({"items": [1, 2, 3]}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_retried_until_budget() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/items")
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let s = stack(&server.url(), 2);
    let err = s.client.get_json::<Value>("/api/items").await.unwrap_err();

    match err {
        RequestError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    mock.assert_async().await;
    assert_eq!(s.guard.completed_episodes(), 0);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let s = stack(&server.url(), 3);
    let err = s.client.get_json::<Value>("/api/missing").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_tears_session_down() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", "/api/me")
        .match_header("authorization", "Bearer stale.session.token")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let signout = server
        .mock("POST", "/api/auth/signout")
        .match_body(mockito::Matcher::Json(json!({"redirect": false})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let s = stack(&server.url(), 3);
    s.storage.set("token", "stale");
    s.client.set_bearer_token(Some("stale.session.token".to_string()));

    let err = s.client.get_json::<Value>("/api/me").await.unwrap_err();
    s.guard.wait_idle().await;

    assert!(err.is_auth_failure());
    assert_eq!(err.status(), Some(401));
    rejected.assert_async().await;
    signout.assert_async().await;
    assert_eq!(s.guard.completed_episodes(), 1);
    assert!(s.storage.is_empty());
    assert_eq!(s.navigator.visits(), vec![Navigation::Client("/".to_string())]);
}

#[tokio::test]
async fn test_rejected_token_discarded_after_teardown() {
    let mut server = mockito::Server::new_async().await;
    let claims = json!({"id": "u", "role_id": 2, "iat": 1_700_000_000, "exp": 4_102_444_800i64});
    let token = format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode("{}"),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let rejected = server
        .mock("GET", "/api/me")
        .match_header("authorization", format!("Bearer {}", token).as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let _signout = server
        .mock("POST", "/api/auth/signout")
        .with_status(200)
        .create_async()
        .await;

    let s = stack(&server.url(), 3);
    s.client.set_bearer_token(Some(token));
    assert_eq!(s.client.session_claims().unwrap().subject_id, "u");

    s.client.get_json::<Value>("/api/me").await.unwrap_err();
    s.guard.wait_idle().await;

    assert_eq!(s.guard.completed_episodes(), 1);
    assert!(s.client.session_claims().is_none());
    assert!(s.guard.inspector().cached().is_none());
    rejected.assert_async().await;

    // Later requests go out without the rejected credential.
    let anonymous = server
        .mock("GET", "/api/public")
        .match_header("authorization", mockito::Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let body: Value = s.client.get_json("/api/public").await.unwrap();
    assert_eq!(body, json!({}));
    anonymous.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_teardown() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("GET", "/api/me")
        .with_status(401)
        .expect(4)
        .create_async()
        .await;

    let provider = Arc::new(GatedSignOut {
        gate: Semaphore::new(0),
    });
    let s = stack_with_provider(&server.url(), 3, provider.clone());

    let (a, b, c, d) = tokio::join!(
        s.client.get_json::<Value>("/api/me"),
        s.client.get_json::<Value>("/api/me"),
        s.client.get_json::<Value>("/api/me"),
        s.client.get_json::<Value>("/api/me"),
    );
    for result in [a, b, c, d] {
        assert!(result.unwrap_err().is_auth_failure());
    }
    // Every caller saw its 401 after the episode was already claimed.
    assert_eq!(s.guard.state(), TeardownState::TearingDown);

    provider.gate.add_permits(1);
    s.guard.wait_idle().await;

    rejected.assert_async().await;
    assert_eq!(s.guard.completed_episodes(), 1);
    assert_eq!(s.navigator.visits(), vec![Navigation::Client("/".to_string())]);
}

#[tokio::test]
async fn test_forbidden_with_rejected_sign_out_reloads() {
    let mut server = mockito::Server::new_async().await;
    let forbidden = server
        .mock("POST", "/api/orders")
        .match_body(mockito::Matcher::Json(json!({"sku": "a"})))
        .with_status(403)
        .expect(1)
        .create_async()
        .await;
    let _signout = server
        .mock("POST", "/api/auth/signout")
        .with_status(500)
        .create_async()
        .await;

    let s = stack(&server.url(), 3);
    let err = s
        .client
        .post_json::<_, Value>("/api/orders", &json!({"sku": "a"}))
        .await
        .unwrap_err();
    s.guard.wait_idle().await;

    assert_eq!(err.status(), Some(403));
    forbidden.assert_async().await;
    assert_eq!(s.guard.completed_episodes(), 1);
    assert_eq!(
        s.navigator.visits(),
        vec![
            Navigation::Client("/".to_string()),
            Navigation::Hard("/".to_string())
        ]
    );
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Nothing listens on port 9 of localhost in the test environment.
    let s = stack("http://127.0.0.1:9", 1);
    let err = s.client.get_json::<Value>("/api").await.unwrap_err();

    assert_eq!(err.status(), None);
    assert!(!err.is_auth_failure());
    assert_eq!(s.guard.completed_episodes(), 0);
}
