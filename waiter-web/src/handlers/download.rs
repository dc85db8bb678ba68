//! File download and video page handlers

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::json;
use waiter_core::authorize;
use waiter_core::entries::RouteKind;

use super::range::extract_range_header;
use crate::error::WebError;
use crate::responder::ServeRequest;
use crate::server::AppState;
use crate::views::VIDEO_VIEW;

/// Delivers a file the token grants, honouring the `Range` header.
pub async fn download_file(
    State(state): State<AppState>,
    Path((guid, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    let token = state.resolve_token(&guid).await?;
    let theme = token.theme.as_deref();
    let requested = path.trim_end_matches('/');

    let full_path = authorize(&state.config.media.base_path, &token, requested)
        .map_err(|e| state.error_response(&WebError::from(e), theme))?;
    let filename = full_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    state
        .responder
        .serve(ServeRequest {
            full_path,
            filename,
            token: &token,
            range_header: extract_range_header(&headers),
        })
        .await
        .map_err(|e| state.error_response(&WebError::from(e), theme))
}

/// Renders the in-browser player for a file the token grants.
pub async fn stream_page(
    State(state): State<AppState>,
    Path((guid, path)): Path<(String, String)>,
) -> Result<Response, Response> {
    let token = state.resolve_token(&guid).await?;
    let theme = token.theme.as_deref();
    let requested = path.trim_end_matches('/');

    let full_path = authorize(&state.config.media.base_path, &token, requested)
        .map_err(|e| state.error_response(&WebError::from(e), theme))?;

    if !tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
        return Err(state.error_response(&WebError::BadPath { path: full_path }, theme));
    }

    Ok(state.render(
        VIDEO_VIEW,
        json!({
            "title": token.display_name,
            "filename": token.filename,
            "video_file": state.entries.route(RouteKind::File, &guid, requested),
            "viewed_url": state.config.server.page_viewed_url(),
            "guid": guid,
            "theme": token.theme,
        }),
    ))
}
