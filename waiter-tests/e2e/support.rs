//! Shared fixtures for gateway tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;
use waiter_core::{
    DownloadClick, MediaViewerApi, RemoteError, TokenLookup, TokenRecord, WaiterConfig,
};
use waiter_web::{AppState, JsonViewRenderer, build_router};

/// Media viewer stand-in with scripted tokens and recorded side effects.
#[derive(Default)]
pub struct MockMediaViewer {
    tokens: Mutex<HashMap<String, TokenLookup>>,
    pub fetches: Mutex<u32>,
    pub clicks: Mutex<Vec<DownloadClick>>,
    pub viewed: Mutex<Vec<String>>,
    unreachable: bool,
    fail_tracking: bool,
}

impl MockMediaViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn failing_tracking() -> Self {
        Self {
            fail_tracking: true,
            ..Self::default()
        }
    }

    pub fn with_token(self, guid: &str, lookup: TokenLookup) -> Self {
        self.tokens.lock().insert(guid.to_string(), lookup);
        self
    }

    fn outage(&self) -> RemoteError {
        RemoteError::Status {
            url: "http://mediaviewer.test".to_string(),
            status: 503,
        }
    }
}

#[async_trait]
impl MediaViewerApi for MockMediaViewer {
    async fn fetch_token(&self, guid: &str) -> Result<TokenLookup, RemoteError> {
        *self.fetches.lock() += 1;
        if self.unreachable {
            return Err(self.outage());
        }
        Ok(self
            .tokens
            .lock()
            .get(guid)
            .cloned()
            .unwrap_or(TokenLookup::Missing))
    }

    async fn report_download(&self, click: &DownloadClick) -> Result<(), RemoteError> {
        self.clicks.lock().push(click.clone());
        if self.fail_tracking {
            return Err(self.outage());
        }
        Ok(())
    }

    async fn mark_viewed(&self, guid: &str) -> Result<(), RemoteError> {
        if self.unreachable {
            return Err(self.outage());
        }
        self.viewed.lock().push(guid.to_string());
        Ok(())
    }
}

pub fn episode_token(guid: &str, path: &str, filename: &str) -> TokenRecord {
    TokenRecord {
        guid: guid.to_string(),
        is_movie: false,
        path: path.to_string(),
        filename: filename.to_string(),
        display_name: "Some Show S01E01".to_string(),
        user_id: 3,
        token_id: 99,
        theme: Some("dark".to_string()),
        username: Some("viewer".to_string()),
        tv_id: Some(12),
        tv_name: Some("Some Show".to_string()),
        next_id: Some(100),
        previous_id: None,
        binge_mode: true,
    }
}

pub fn movie_token(guid: &str, path: &str, directory: &str) -> TokenRecord {
    TokenRecord {
        is_movie: true,
        display_name: "Some Movie".to_string(),
        tv_id: None,
        tv_name: None,
        next_id: None,
        binge_mode: false,
        ..episode_token(guid, path, directory)
    }
}

pub fn gateway(config: WaiterConfig, api: Arc<MockMediaViewer>) -> Router {
    build_router(AppState::new(config, api, Arc::new(JsonViewRenderer)))
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_range(app: &Router, uri: &str, range: &str) -> Response<Body> {
    send(
        app,
        Request::get(uri)
            .header("Range", range)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
