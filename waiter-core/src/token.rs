//! Token records and their resolution against the media viewer service.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, warn};

use crate::GENERIC_ERROR_MESSAGE;
use crate::remote::{MediaViewerApi, RemoteError, TokenLookup};
use crate::retry::{RetryError, RetryPolicy, with_retry};

/// Message shown when the service returns an empty record for a GUID
pub const INVALID_TOKEN_MESSAGE: &str = "This token is invalid";

/// Authorization and metadata payload resolved for a GUID.
///
/// For movie tokens `path`/`filename` name a directory that is scanned
/// recursively; otherwise they name exactly one file. Built per request and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub guid: String,
    #[serde(rename = "ismovie")]
    pub is_movie: bool,
    /// Directory relative to the media base path; absolute paths are used as-is
    pub path: String,
    pub filename: String,
    #[serde(rename = "displayname", default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(rename = "userid")]
    pub user_id: i64,
    #[serde(rename = "tokenid")]
    pub token_id: i64,
    #[serde(rename = "waitertheme", default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub tv_id: Option<i64>,
    #[serde(default)]
    pub tv_name: Option<String>,
    #[serde(default)]
    pub next_id: Option<i64>,
    #[serde(default)]
    pub previous_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub binge_mode: bool,
}

/// Reads an explicit JSON `null` as the field's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors resolving a GUID into a usable token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The lookup call failed on every attempt or returned garbage
    #[error("Token lookup failed: {0}")]
    Remote(#[from] RetryError<RemoteError>),

    /// The service reported the token as unusable
    #[error("Token {guid} is invalid: {message}")]
    Invalid {
        /// GUID that was looked up
        guid: String,
        /// Service-supplied reason, shown verbatim
        message: String,
    },
}

impl TokenError {
    /// Text that may be shown to the user.
    ///
    /// Remote failures collapse to the generic message; service-supplied
    /// reasons are passed through unchanged.
    pub fn user_message(&self) -> String {
        match self {
            TokenError::Remote(_) => GENERIC_ERROR_MESSAGE.to_string(),
            TokenError::Invalid { message, .. } => message.clone(),
        }
    }
}

/// Resolves GUIDs through the media viewer with bounded retry.
#[derive(Clone)]
pub struct TokenResolver {
    api: Arc<dyn MediaViewerApi>,
    policy: RetryPolicy,
}

impl TokenResolver {
    /// Creates a resolver that retries lookups according to `policy`.
    pub fn new(api: Arc<dyn MediaViewerApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Fetches and validates the token for `guid`.
    ///
    /// # Errors
    ///
    /// - `TokenError::Remote` - If every lookup attempt failed or the body was malformed
    /// - `TokenError::Invalid` - If the service rejected the token or returned an empty record
    pub async fn resolve(&self, guid: &str) -> Result<TokenRecord, TokenError> {
        let lookup = with_retry("fetch_token", self.policy, || self.api.fetch_token(guid))
            .await
            .map_err(|e| {
                error!(guid, error = %e, "Token lookup failed");
                TokenError::from(e)
            })?;

        validate_lookup(guid, lookup)
    }
}

/// Turns a lookup outcome into a usable token.
///
/// The service is the source of truth for expiry and ownership; this only
/// maps its verdict and fills in the GUID when the record omits it.
///
/// # Errors
///
/// - `TokenError::Invalid` - If the lookup was rejected or empty
pub fn validate_lookup(guid: &str, lookup: TokenLookup) -> Result<TokenRecord, TokenError> {
    match lookup {
        TokenLookup::Found(mut token) => {
            if token.guid.is_empty() {
                token.guid = guid.to_string();
            }
            Ok(token)
        }
        TokenLookup::Rejected { message } => {
            warn!(guid, %message, "Token rejected by media viewer");
            Err(TokenError::Invalid {
                guid: guid.to_string(),
                message,
            })
        }
        TokenLookup::Missing => {
            warn!(guid, "No token record for GUID");
            Err(TokenError::Invalid {
                guid: guid.to_string(),
                message: INVALID_TOKEN_MESSAGE.to_string(),
            })
        }
    }
}
