//! Outbound calls to the media viewer service.
//!
//! The media viewer owns tokens and download statistics. This module defines the
//! calls the gateway makes against it; [`HttpMediaViewerClient`] is the HTTP
//! implementation, tests substitute their own.

pub mod client;

use async_trait::async_trait;
use serde::Serialize;

pub use client::{HttpMediaViewerClient, parse_token_response};

use crate::token::TokenRecord;

/// Operations the gateway needs from the media viewer service.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// caller's business (see [`crate::retry::with_retry`]).
#[async_trait]
pub trait MediaViewerApi: Send + Sync {
    /// Looks up the token record for `guid`.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Request` - If the service could not be reached
    /// - `RemoteError::Status` - If the service answered with a non-success status
    /// - `RemoteError::Malformed` - If the body is not a token record
    async fn fetch_token(&self, guid: &str) -> Result<TokenLookup, RemoteError>;

    /// Records that a download was started.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Request` - If the service could not be reached
    /// - `RemoteError::Status` - If the service rejected the report
    async fn report_download(&self, click: &DownloadClick) -> Result<(), RemoteError>;

    /// Marks the media behind `guid` as viewed.
    ///
    /// # Errors
    ///
    /// - `RemoteError::Request` - If the service could not be reached
    /// - `RemoteError::Status` - If the service rejected the update
    async fn mark_viewed(&self, guid: &str) -> Result<(), RemoteError>;
}

/// Outcome of a token lookup, classified at the deserialization boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    /// The service returned a usable token record
    Found(TokenRecord),
    /// The service explained why the token cannot be used
    Rejected {
        /// Service-supplied text, safe to show to the user
        message: String,
    },
    /// The service returned an empty record
    Missing,
}

/// Form body of a download-tracking report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadClick {
    #[serde(rename = "userid")]
    pub user_id: i64,
    #[serde(rename = "tokenid")]
    pub token_id: i64,
    pub filename: String,
    /// Bytes the client asked for
    pub size: u64,
}

/// Errors talking to the media viewer service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport-level failure (connect, TLS, timeout, body read)
    #[error("Request to {url} failed: {source}")]
    Request {
        /// Endpoint that was called
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status code
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Endpoint that was called
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The response body does not have the token record shape
    #[error("Malformed token response: {reason}")]
    Malformed {
        /// Parser message
        reason: String,
    },

    /// The HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(#[source] reqwest::Error),
}
