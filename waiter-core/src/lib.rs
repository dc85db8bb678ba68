//! Waiter Core - Token resolution, media listing and range handling
//!
//! This crate provides the building blocks of the Waiter media gateway:
//! resolving GUIDs against the media viewer service with bounded retry,
//! turning tokens into servable entries, checking that requested paths stay
//! inside a token's grant, and computing byte windows for range requests.

pub mod access;
pub mod config;
pub mod entries;
pub mod health;
pub mod mode;
pub mod range;
pub mod remote;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
pub mod token;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use access::{AccessError, authorize};
pub use config::{ConfigError, WaiterConfig};
pub use entries::{Entry, EntryBuilder, EntryError};
pub use health::{HealthStatus, probe};
pub use mode::DeliveryMode;
pub use range::{RangeWindow, compute_window};
pub use remote::{DownloadClick, HttpMediaViewerClient, MediaViewerApi, RemoteError, TokenLookup};
pub use retry::{RetryError, RetryPolicy, with_retry};
pub use token::{TokenError, TokenRecord, TokenResolver};

/// Message shown to users for any failure whose details must stay internal
pub const GENERIC_ERROR_MESSAGE: &str = "An error has occurred";

/// Core errors that can bubble up from any Waiter subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum WaiterError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Entry error: {0}")]
    Entries(#[from] EntryError),

    #[error("Remote service error: {0}")]
    Remote(#[from] RetryError<RemoteError>),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaiterError {
    /// Returns a message suitable for display to the end user.
    ///
    /// Only service-supplied token errors and the unauthorized notice are
    /// specific; everything else is the generic message.
    pub fn user_message(&self) -> String {
        match self {
            WaiterError::Token(e) => e.user_message(),
            WaiterError::Access(_) => access::UNAUTHORIZED_MESSAGE.to_string(),
            WaiterError::Entries(_)
            | WaiterError::Remote(_)
            | WaiterError::Configuration(_)
            | WaiterError::Io(_) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Checks if this error was caused by what the client asked for.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            WaiterError::Token(TokenError::Invalid { .. }) | WaiterError::Access(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WaiterError>;
