//! Service endpoints: health status and viewed marking

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use waiter_core::{WaiterError, probe, with_retry};

use crate::error::WebError;
use crate::server::AppState;

/// Reports whether every media mount is present.
///
/// Answers `{"status": bool}` with 200 when healthy and 500 otherwise.
pub async fn status(State(state): State<AppState>) -> Response {
    let health = probe(&state.config.media.mount_points()).await;
    let code = if health.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (code, Json(health)).into_response()
}

/// Tells the media viewer the media behind `guid` was watched.
pub async fn mark_viewed(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Result<Json<serde_json::Value>, Response> {
    with_retry("mark_viewed", state.config.remote.tracking_retry, || {
        state.api.mark_viewed(&guid)
    })
    .await
    .map_err(|e| state.error_response(&WebError::Core(WaiterError::from(e)), None))?;

    Ok(Json(json!({"msg": "Viewed set successfully"})))
}
