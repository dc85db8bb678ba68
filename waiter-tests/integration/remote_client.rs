//! Media viewer client against a stub HTTP service

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use waiter_core::config::RemoteConfig;
use waiter_core::{
    DownloadClick, HttpMediaViewerClient, MediaViewerApi, RemoteError, RetryPolicy, TokenError,
    TokenLookup, TokenResolver,
};

/// Basic auth header for `waiter:secret`
const EXPECTED_AUTH: &str = "Basic d2FpdGVyOnNlY3JldA==";

type FormLog = Arc<Mutex<Vec<HashMap<String, String>>>>;

#[derive(Clone, Default)]
struct StubState {
    lookups: Arc<Mutex<u32>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
    clicks: FormLog,
    viewed: FormLog,
}

async fn token_lookup(
    State(state): State<StubState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Response {
    *state.lookups.lock() += 1;
    state.authorizations.lock().push(
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );

    match guid.as_str() {
        "good" => Json(json!({
            "ismovie": false,
            "path": "tv shows/Some Show",
            "filename": "ep1.mp4",
            "displayname": "Some Show S01E01",
            "userid": 3,
            "tokenid": 99,
            "waitertheme": "dark",
            "tv_id": 12,
            "next_id": 100,
            "binge_mode": true,
            "unexpected": "ignored",
        }))
        .into_response(),
        "expired" => Json(json!({"errmsg": "Token has expired"})).into_response(),
        "empty" => "null".into_response(),
        "truncated" => Json(json!({"ismovie": true})).into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({})).into_response(),
    }
}

async fn download_click(
    State(state): State<StubState>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    state.clicks.lock().push(form);
    StatusCode::OK
}

async fn viewed(
    State(state): State<StubState>,
    Form(form): Form<HashMap<String, String>>,
) -> StatusCode {
    if form.get("guid").map(String::as_str) == Some("locked") {
        return StatusCode::FORBIDDEN;
    }
    state.viewed.lock().push(form);
    StatusCode::OK
}

async fn spawn_stub() -> (SocketAddr, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/api/token/{guid}/", get(token_lookup))
        .route("/api/downloadclick/", post(download_click))
        .route("/api/viewed/", post(viewed))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, state)
}

fn client_config(address: SocketAddr) -> RemoteConfig {
    RemoteConfig {
        guid_url: format!("http://{address}/api/token/{{guid}}/"),
        download_click_url: format!("http://{address}/api/downloadclick/"),
        viewed_url: format!("http://{address}/api/viewed/"),
        username: "waiter".to_string(),
        password: "secret".to_string(),
        request_timeout: Duration::from_secs(5),
        ..RemoteConfig::default()
    }
}

#[tokio::test]
async fn test_token_lookup_outcomes() {
    let (address, stub) = spawn_stub().await;
    let client = HttpMediaViewerClient::new(&client_config(address)).unwrap();

    let TokenLookup::Found(token) = client.fetch_token("good").await.unwrap() else {
        panic!("expected a token record");
    };
    assert_eq!(token.path, "tv shows/Some Show");
    assert_eq!(token.user_id, 3);
    assert_eq!(token.token_id, 99);
    assert_eq!(token.theme.as_deref(), Some("dark"));
    assert_eq!(token.next_id, Some(100));
    assert!(token.binge_mode);

    assert_eq!(
        client.fetch_token("expired").await.unwrap(),
        TokenLookup::Rejected {
            message: "Token has expired".to_string()
        }
    );
    assert_eq!(
        client.fetch_token("empty").await.unwrap(),
        TokenLookup::Missing
    );
    assert_eq!(
        client.fetch_token("unknown").await.unwrap(),
        TokenLookup::Missing
    );
    assert!(matches!(
        client.fetch_token("truncated").await,
        Err(RemoteError::Malformed { .. })
    ));
    assert!(matches!(
        client.fetch_token("broken").await,
        Err(RemoteError::Status { status: 500, .. })
    ));

    let authorizations = stub.authorizations.lock();
    assert!(
        authorizations
            .iter()
            .all(|auth| auth.as_deref() == Some(EXPECTED_AUTH))
    );
}

#[tokio::test]
async fn test_download_click_form() {
    let (address, stub) = spawn_stub().await;
    let client = HttpMediaViewerClient::new(&client_config(address)).unwrap();

    client
        .report_download(&DownloadClick {
            user_id: 3,
            token_id: 99,
            filename: "ep 1.mp4".to_string(),
            size: 1_048_576,
        })
        .await
        .unwrap();

    let clicks = stub.clicks.lock();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0]["userid"], "3");
    assert_eq!(clicks[0]["tokenid"], "99");
    assert_eq!(clicks[0]["filename"], "ep 1.mp4");
    assert_eq!(clicks[0]["size"], "1048576");
}

#[tokio::test]
async fn test_viewed_form_and_rejection() {
    let (address, stub) = spawn_stub().await;
    let client = HttpMediaViewerClient::new(&client_config(address)).unwrap();

    client.mark_viewed("g1").await.unwrap();
    assert!(matches!(
        client.mark_viewed("locked").await,
        Err(RemoteError::Status { status: 403, .. })
    ));

    let viewed = stub.viewed.lock();
    assert_eq!(viewed.len(), 1);
    assert_eq!(viewed[0]["viewed"], "true");
    assert_eq!(viewed[0]["guid"], "g1");
}

#[tokio::test]
async fn test_resolver_retries_failing_lookups() {
    let (address, stub) = spawn_stub().await;
    let client = Arc::new(HttpMediaViewerClient::new(&client_config(address)).unwrap());
    let resolver = TokenResolver::new(client, RetryPolicy::new(3, Duration::ZERO));

    let error = resolver.resolve("broken").await.unwrap_err();

    assert!(matches!(error, TokenError::Remote(ref e) if e.attempts == 3));
    assert_eq!(error.user_message(), "An error has occurred");
    assert_eq!(*stub.lookups.lock(), 3);
}

#[tokio::test]
async fn test_resolver_does_not_retry_rejections() {
    let (address, stub) = spawn_stub().await;
    let client = Arc::new(HttpMediaViewerClient::new(&client_config(address)).unwrap());
    let resolver = TokenResolver::new(client, RetryPolicy::new(3, Duration::ZERO));

    let error = resolver.resolve("expired").await.unwrap_err();

    assert_eq!(error.user_message(), "Token has expired");
    assert_eq!(*stub.lookups.lock(), 1);
}

#[tokio::test]
async fn test_unreachable_service_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpMediaViewerClient::new(&client_config(address)).unwrap();

    assert!(matches!(
        client.fetch_token("good").await,
        Err(RemoteError::Request { .. })
    ));
}
