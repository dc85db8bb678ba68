//! View rendering seam
//!
//! Pages are produced by an external renderer. Handlers hand it a view name and
//! a JSON context; the bundled [`JsonViewRenderer`] returns both as JSON so the
//! gateway runs without any templates installed.

use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};

/// Directory or single-file listing
pub const DISPLAY_VIEW: &str = "display";
/// In-browser video player page
pub const VIDEO_VIEW: &str = "video";
/// Error page
pub const ERROR_VIEW: &str = "error";

/// Turns a named view and its context into a response body.
pub trait ViewRenderer: Send + Sync {
    /// Renders `view` with `context`. The caller sets the status code.
    fn render(&self, view: &str, context: Value) -> Response;
}

/// Renders views as `{"view": name, "context": {...}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonViewRenderer;

impl ViewRenderer for JsonViewRenderer {
    fn render(&self, view: &str, context: Value) -> Response {
        Json(json!({
            "view": view,
            "context": context,
        }))
        .into_response()
    }
}
