//! Gateway server: shared state, routes and startup
//!
//! Every route lives under the configured application prefix and every response
//! advertises byte-range support.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::ACCEPT_RANGES;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};
use waiter_core::{
    DeliveryMode, EntryBuilder, HttpMediaViewerClient, MediaViewerApi, TokenRecord,
    TokenResolver, WaiterConfig,
};

use crate::error::WebError;
use crate::handlers::{dir_listing, download_file, file_listing, mark_viewed, status, stream_page};
use crate::responder::{
    DirectDelivery, DownloadTracker, FileDelivery, OffloadDelivery, PartialContentResponder,
};
use crate::views::{ERROR_VIEW, JsonViewRenderer, ViewRenderer};

/// State shared by all request handlers.
///
/// Everything is read-only after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<WaiterConfig>,
    /// GUID to token resolution with retry
    pub resolver: TokenResolver,
    /// Entry listing rules
    pub entries: EntryBuilder,
    /// Media viewer service client
    pub api: Arc<dyn MediaViewerApi>,
    /// File delivery, direct or offloaded depending on configuration
    pub responder: PartialContentResponder,
    /// Page renderer
    pub views: Arc<dyn ViewRenderer>,
}

impl AppState {
    /// Wires the gateway components from `config`.
    ///
    /// The delivery strategy is picked here, once, from
    /// `config.server.delivery_mode`.
    pub fn new(
        config: WaiterConfig,
        api: Arc<dyn MediaViewerApi>,
        views: Arc<dyn ViewRenderer>,
    ) -> Self {
        let delivery: Arc<dyn FileDelivery> = match config.server.delivery_mode {
            DeliveryMode::Offload => Arc::new(OffloadDelivery::new(
                &config.server.offload_location,
                config.server.offload_strip_depth,
            )),
            DeliveryMode::Direct => Arc::new(DirectDelivery),
        };
        info!("Delivering files in {} mode", config.server.delivery_mode);

        let tracker = DownloadTracker::new(api.clone(), config.remote.tracking_retry);
        let resolver = TokenResolver::new(api.clone(), config.remote.token_retry);
        let entries = EntryBuilder::new(&config.media, config.server.route_prefix());

        Self {
            config: Arc::new(config),
            resolver,
            entries,
            api,
            responder: PartialContentResponder::new(delivery, tracker),
            views,
        }
    }

    /// Resolves `guid`, turning failures into the error page.
    ///
    /// # Errors
    ///
    /// Returns the rendered error response when the token cannot be resolved
    /// or was rejected.
    pub async fn resolve_token(&self, guid: &str) -> Result<TokenRecord, Response> {
        self.resolver
            .resolve(guid)
            .await
            .map_err(|e| self.error_response(&WebError::from(e), None))
    }

    /// Renders `view` with `context` and status 200.
    pub fn render(&self, view: &str, context: Value) -> Response {
        self.views.render(view, context)
    }

    /// Renders the error page for `error`.
    ///
    /// Internal failures are logged in full and shown as the generic message.
    pub fn error_response(&self, error: &WebError, theme: Option<&str>) -> Response {
        if error.is_internal() {
            error!(error = %error, "Request failed");
        } else {
            warn!(error = %error, "Request rejected");
        }

        let context = json!({
            "title": "Error",
            "error_text": error.user_message(),
            "theme": theme,
            "mediaviewer_base_url": self.config.server.mediaviewer_base_url,
        });

        (error.status_code(), self.render(ERROR_VIEW, context)).into_response()
    }
}

/// Builds the gateway router for `state`.
///
/// Routes are nested under `server.app_prefix`; an empty or `/` prefix mounts
/// them at the root.
pub fn build_router(state: AppState) -> Router {
    let prefix = state.config.server.route_prefix().to_string();

    let routes = Router::new()
        .route("/dir/{guid}/", get(dir_listing))
        .route("/file/{guid}/", get(file_listing))
        .route("/file/{guid}/{*path}", get(download_file))
        .route("/stream/{guid}/{*path}", get(stream_page))
        .route("/viewed/{guid}", get(mark_viewed))
        .route("/viewed/{guid}/", get(mark_viewed))
        .route("/status", get(status))
        .route("/status/", get(status))
        .with_state(state);

    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    };

    app.layer(SetResponseHeaderLayer::if_not_present(
        ACCEPT_RANGES,
        HeaderValue::from_static("bytes"),
    ))
    .layer(CorsLayer::permissive())
}

/// Runs the gateway until interrupted.
///
/// # Errors
///
/// - If the media viewer client cannot be built
/// - If the listen address cannot be bound
/// - If the server fails while running
pub async fn run_server(config: WaiterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let api: Arc<dyn MediaViewerApi> = Arc::new(HttpMediaViewerClient::new(&config.remote)?);
    let address = format!("{}:{}", config.server.host, config.server.port);
    let prefix = config.server.app_prefix.clone();

    let state = AppState::new(config, api, Arc::new(JsonViewRenderer));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Waiter gateway running on http://{}{}", address, prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiter gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
