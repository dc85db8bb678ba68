//! Listing pages for a token's media

use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::json;
use waiter_core::{Entry, TokenRecord};

use crate::error::WebError;
use crate::server::AppState;
use crate::views::DISPLAY_VIEW;

/// Lists every servable entry a token grants, sorted by filename.
pub async fn dir_listing(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Response, Response> {
    let token = state.resolve_token(&guid).await?;

    let mut files = state
        .entries
        .build(&token)
        .await
        .map_err(|e| state.error_response(&WebError::from(e), token.theme.as_deref()))?;
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(render_display(&state, &token, files))
}

/// Lists the single file of a non-movie token.
pub async fn file_listing(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Response, Response> {
    let token = state.resolve_token(&guid).await?;
    let theme = token.theme.as_deref();

    if token.is_movie {
        return Err(state.error_response(&WebError::MovieTypeMismatch { guid }, theme));
    }

    let files = state
        .entries
        .build(&token)
        .await
        .map_err(|e| state.error_response(&WebError::from(e), theme))?;

    Ok(render_display(&state, &token, files))
}

fn render_display(state: &AppState, token: &TokenRecord, files: Vec<Entry>) -> Response {
    let base_url = state.config.server.mediaviewer_base_url.as_str();

    state.render(
        DISPLAY_VIEW,
        json!({
            "title": token.display_name,
            "files": files,
            "guid": token.guid,
            "is_movie": token.is_movie,
            "username": token.username,
            "theme": token.theme,
            "tv_id": token.tv_id,
            "tv_name": token.tv_name,
            "binge_mode": token.binge_mode,
            "next_link": token.next_id.map(|id| autoplay_link(base_url, id)),
            "previous_link": token.previous_id.map(|id| autoplay_link(base_url, id)),
            "mediaviewer_base_url": base_url,
        }),
    )
}

/// Media viewer page that hands out a fresh download link for token `id`.
fn autoplay_link(base_url: &str, id: i64) -> String {
    format!("{}/autoplaydownloadlink/{id}/", base_url.trim_end_matches('/'))
}
