//! Waiter Web - Media gateway HTTP server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Resolves access tokens, lists the media they grant, and delivers files with
//! byte-range support, either directly or by handing the transfer to a reverse
//! proxy through `X-Accel-Redirect`.

pub mod error;
pub mod handlers;
pub mod responder;
pub mod server;
pub mod views;

// Re-export main types
pub use error::WebError;
pub use responder::{
    DirectDelivery, DownloadTracker, FileDelivery, OffloadDelivery, PartialContentResponder,
    ServeError, ServeRequest,
};
pub use server::{AppState, build_router, run_server};
pub use views::{JsonViewRenderer, ViewRenderer};
