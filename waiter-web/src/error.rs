//! Request-level errors and their mapping to status codes and user text

use std::path::PathBuf;

use axum::http::StatusCode;
use waiter_core::{AccessError, EntryError, GENERIC_ERROR_MESSAGE, TokenError, WaiterError};

use crate::responder::ServeError;

/// Shown when a movie token is used on the single-file listing route
pub const INVALID_MOVIE_URL_MESSAGE: &str = "Invalid URL for movie type";
/// Shown when the video page is requested for a file that does not exist
pub const BAD_PATH_MESSAGE: &str = "Bad path or filename";

/// Everything a gateway request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Token, entry, access or remote failure from the core
    #[error(transparent)]
    Core(#[from] WaiterError),

    /// The file could not be delivered
    #[error(transparent)]
    Serve(#[from] ServeError),

    /// A movie token was used where a single-file token is required
    #[error("Movie token {guid} used on the single-file route")]
    MovieTypeMismatch {
        /// GUID of the offending token
        guid: String,
    },

    /// The video page names a file that does not exist
    #[error("No media file at {}", path.display())]
    BadPath {
        /// Resolved path that was checked
        path: PathBuf,
    },
}

impl WebError {
    /// HTTP status to answer with.
    ///
    /// Page-level failures answer 400 like every other client-visible error;
    /// only delivery failures use 404 and 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Serve(ServeError::NotFound { .. }) => StatusCode::NOT_FOUND,
            WebError::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::Core(_) | WebError::MovieTypeMismatch { .. } | WebError::BadPath { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Text that may be shown to the client.
    pub fn user_message(&self) -> String {
        match self {
            WebError::Core(e) => e.user_message(),
            WebError::Serve(_) => GENERIC_ERROR_MESSAGE.to_string(),
            WebError::MovieTypeMismatch { .. } => INVALID_MOVIE_URL_MESSAGE.to_string(),
            WebError::BadPath { .. } => BAD_PATH_MESSAGE.to_string(),
        }
    }

    /// Whether the details of this error are hidden behind the generic message.
    pub fn is_internal(&self) -> bool {
        match self {
            WebError::Core(e) => !e.is_user_error(),
            WebError::Serve(_) => true,
            WebError::MovieTypeMismatch { .. } | WebError::BadPath { .. } => false,
        }
    }
}

impl From<TokenError> for WebError {
    fn from(error: TokenError) -> Self {
        WebError::Core(error.into())
    }
}

impl From<EntryError> for WebError {
    fn from(error: EntryError) -> Self {
        WebError::Core(error.into())
    }
}

impl From<AccessError> for WebError {
    fn from(error: AccessError) -> Self {
        WebError::Core(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_supplied_text_is_shown_verbatim() {
        let error = WebError::from(TokenError::Invalid {
            guid: "g".to_string(),
            message: "Token has expired".to_string(),
        });

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.user_message(), "Token has expired");
        assert!(!error.is_internal());
    }

    #[test]
    fn test_delivery_failures_hide_details() {
        let error = WebError::from(ServeError::NotFound {
            path: PathBuf::from("/mnt/media/secret/file.mp4"),
        });

        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.user_message(), GENERIC_ERROR_MESSAGE);
        assert!(error.is_internal());
    }

    #[test]
    fn test_movie_type_mismatch_message() {
        let error = WebError::MovieTypeMismatch {
            guid: "g".to_string(),
        };

        assert_eq!(error.user_message(), "Invalid URL for movie type");
    }
}
