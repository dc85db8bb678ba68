//! Centralized configuration for Waiter.
//!
//! All tunable parameters and deployment settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

use crate::mode::DeliveryMode;
use crate::retry::RetryPolicy;

/// Central configuration for all Waiter components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct WaiterConfig {
    pub media: MediaConfig,
    pub remote: RemoteConfig,
    pub server: ServerConfig,
}

/// Media library layout and listing rules.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Root directory all token paths are relative to
    pub base_path: PathBuf,
    /// Top-level directories under `base_path` that must exist for a healthy deployment
    pub media_dirs: Vec<PathBuf>,
    /// Files smaller than this are not listed
    pub minimum_file_size: u64,
    /// Extensions (with leading dot, lowercase) that browsers can play directly
    pub streamable_file_types: Vec<String>,
    /// Filename marker used by the companion encoder
    pub alfred_suffix: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/mnt/media"),
            media_dirs: vec![PathBuf::from("Movies"), PathBuf::from("tv shows")],
            minimum_file_size: 10_000_000, // 10 MB
            streamable_file_types: vec![".mp4".to_string()],
            alfred_suffix: ".mv-encoded".to_string(),
        }
    }
}

impl MediaConfig {
    /// Mount points checked by the health probe, resolved against `base_path`.
    pub fn mount_points(&self) -> Vec<PathBuf> {
        self.media_dirs
            .iter()
            .map(|dir| self.base_path.join(dir))
            .collect()
    }
}

/// Authorization and tracking service endpoints.
///
/// All three endpoints share the same basic-auth credentials and TLS policy.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Token lookup URL, `{guid}` is replaced with the requested GUID
    pub guid_url: String,
    /// Download-tracking endpoint
    pub download_click_url: String,
    /// Viewed-marking endpoint
    pub viewed_url: String,
    pub username: String,
    pub password: String,
    /// Verify TLS certificates of the remote service
    pub verify_tls: bool,
    /// Timeout applied to every outbound request
    pub request_timeout: Duration,
    /// Retry policy for token lookups
    pub token_retry: RetryPolicy,
    /// Retry policy for tracking and viewed-marking calls
    pub tracking_retry: RetryPolicy,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            guid_url: "http://127.0.0.1:8000/mediaviewer/api/token/{guid}/".to_string(),
            download_click_url: "http://127.0.0.1:8000/mediaviewer/api/downloadclick/"
                .to_string(),
            viewed_url: "http://127.0.0.1:8000/mediaviewer/ajaxviewed/".to_string(),
            username: String::new(),
            password: String::new(),
            verify_tls: false,
            request_timeout: Duration::from_secs(10),
            token_retry: RetryPolicy::new(5, Duration::from_secs(1)),
            tracking_retry: RetryPolicy::new(3, Duration::from_secs(1)),
        }
    }
}

/// HTTP listener and delivery settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix every route is mounted under
    pub app_prefix: String,
    /// Whether bytes are sent by this process or by the fronting proxy
    pub delivery_mode: DeliveryMode,
    /// Internal proxy location that offloaded paths are rewritten to
    pub offload_location: String,
    /// Number of leading `/`-separated pieces stripped from the real path when offloading
    pub offload_strip_depth: usize,
    /// Public URL of the media viewer, used for navigation links
    pub mediaviewer_base_url: String,
    /// URL the video page calls once playback is considered viewed.
    /// Defaults to this gateway's own viewed route under `app_prefix`.
    pub viewed_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            app_prefix: "/waiter".to_string(),
            delivery_mode: DeliveryMode::Direct,
            offload_location: "/download".to_string(),
            offload_strip_depth: 3,
            mediaviewer_base_url: "http://127.0.0.1:8000/mediaviewer".to_string(),
            viewed_url: None,
        }
    }
}

impl ServerConfig {
    /// Path prefix with any trailing `/` removed; empty when mounted at the root.
    pub fn route_prefix(&self) -> &str {
        self.app_prefix.trim_end_matches('/')
    }

    /// Page-facing viewed URL: the override, or `<prefix>/viewed/`.
    pub fn page_viewed_url(&self) -> String {
        match &self.viewed_url {
            Some(url) => url.clone(),
            None => format!("{}/viewed/", self.route_prefix()),
        }
    }
}

/// Errors raised while validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configured endpoint is not a valid absolute URL
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Name of the offending setting
        field: &'static str,
        /// Parser message
        reason: String,
    },

    /// The token lookup URL cannot carry a GUID
    #[error("guid_url must contain a {{guid}} placeholder")]
    MissingGuidPlaceholder,

    /// A setting holds a value outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending setting
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

impl WaiterConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Media configuration overrides
        if let Ok(base_path) = std::env::var("WAITER_BASE_PATH") {
            config.media.base_path = PathBuf::from(base_path);
        }

        if let Ok(dirs) = std::env::var("WAITER_MEDIA_DIRS") {
            let dirs: Vec<PathBuf> = dirs
                .split(',')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .collect();
            if !dirs.is_empty() {
                config.media.media_dirs = dirs;
            }
        }

        if let Ok(size) = std::env::var("WAITER_MINIMUM_FILE_SIZE")
            && let Ok(bytes) = size.parse::<u64>()
        {
            config.media.minimum_file_size = bytes;
        }

        if let Ok(suffix) = std::env::var("WAITER_ALFRED_SUFFIX") {
            config.media.alfred_suffix = suffix;
        }

        // Remote service overrides
        if let Ok(url) = std::env::var("WAITER_GUID_URL") {
            config.remote.guid_url = url;
        }

        if let Ok(url) = std::env::var("WAITER_DOWNLOAD_CLICK_URL") {
            config.remote.download_click_url = url;
        }

        if let Ok(url) = std::env::var("MEDIAVIEWER_VIEWED_URL") {
            config.remote.viewed_url = url;
        }

        if let Ok(username) = std::env::var("WAITER_USERNAME") {
            config.remote.username = username;
        }

        if let Ok(password) = std::env::var("WAITER_PASSWORD") {
            config.remote.password = password;
        }

        if let Ok(verify) = std::env::var("WAITER_VERIFY_TLS") {
            config.remote.verify_tls = verify.parse().unwrap_or(false);
        }

        if let Ok(timeout) = std::env::var("WAITER_REQUEST_TIMEOUT")
            && let Ok(seconds) = timeout.parse::<u64>()
        {
            config.remote.request_timeout = Duration::from_secs(seconds);
        }

        // Server overrides
        if let Ok(offload) = std::env::var("WAITER_USE_OFFLOAD")
            && offload.parse().unwrap_or(false)
        {
            config.server.delivery_mode = DeliveryMode::Offload;
        }

        if let Ok(prefix) = std::env::var("WAITER_APP_PREFIX") {
            config.server.app_prefix = prefix;
        }

        if let Ok(url) = std::env::var("WAITER_MEDIAVIEWER_BASE_URL") {
            config.server.mediaviewer_base_url = url;
        }

        if let Ok(url) = std::env::var("WAITER_VIEWED_URL") {
            config.server.viewed_url = Some(url);
        }

        config
    }

    /// Checks endpoint URLs and value ranges.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidUrl` - If a remote endpoint is not an absolute URL
    /// - `ConfigError::MissingGuidPlaceholder` - If `guid_url` has no `{guid}`
    /// - `ConfigError::InvalidValue` - If the app prefix or retry policies are unusable
    ///
    /// An `app_prefix` of `""` or `"/"` mounts the gateway at the root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.remote.guid_url.contains("{guid}") {
            return Err(ConfigError::MissingGuidPlaceholder);
        }

        let endpoints = [
            ("guid_url", self.remote.guid_url.replace("{guid}", "guid")),
            ("download_click_url", self.remote.download_click_url.clone()),
            ("viewed_url", self.remote.viewed_url.clone()),
        ];
        for (field, endpoint) in endpoints {
            url::Url::parse(&endpoint).map_err(|e| ConfigError::InvalidUrl {
                field,
                reason: e.to_string(),
            })?;
        }

        let prefix = &self.server.app_prefix;
        let at_root = prefix.is_empty() || prefix == "/";
        if !at_root && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(ConfigError::InvalidValue {
                field: "app_prefix",
                reason: format!("'{prefix}' must be '/' or start with '/' and not end with one"),
            });
        }

        if self.remote.token_retry.attempts == 0 || self.remote.tracking_retry.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }

        Ok(())
    }

    /// Creates a configuration rooted at a temporary media directory for tests.
    pub fn for_testing(base_path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.media.base_path = base_path.into();
        config.remote.token_retry = RetryPolicy::new(2, Duration::ZERO);
        config.remote.tracking_retry = RetryPolicy::new(2, Duration::ZERO);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = WaiterConfig::default();

        assert_eq!(config.media.minimum_file_size, 10_000_000);
        assert_eq!(config.media.streamable_file_types, vec![".mp4".to_string()]);
        assert_eq!(config.remote.token_retry.attempts, 5);
        assert_eq!(config.remote.token_retry.interval, Duration::from_secs(1));
        assert!(!config.remote.verify_tls);
        assert_eq!(config.server.delivery_mode, DeliveryMode::Direct);
        assert_eq!(config.server.offload_location, "/download");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mount_points_resolve_against_base_path() {
        let mut config = WaiterConfig::default();
        config.media.base_path = PathBuf::from("/srv/media");

        assert_eq!(
            config.media.mount_points(),
            vec![
                PathBuf::from("/srv/media/Movies"),
                PathBuf::from("/srv/media/tv shows")
            ]
        );
    }

    #[test]
    fn test_validate_rejects_missing_placeholder() {
        let mut config = WaiterConfig::default();
        config.remote.guid_url = "http://example.com/token/".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingGuidPlaceholder)
        ));
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let mut config = WaiterConfig::default();
        config.remote.download_click_url = "/downloadclick/".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                field: "download_click_url",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_trailing_slash_prefix() {
        let mut config = WaiterConfig::default();
        config.server.app_prefix = "/waiter/".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_root_prefix() {
        let mut config = WaiterConfig::default();
        for prefix in ["", "/"] {
            config.server.app_prefix = prefix.to_string();
            assert!(config.validate().is_ok(), "prefix {prefix:?}");
        }
    }

    #[test]
    fn test_page_viewed_url_follows_prefix() {
        let mut server = ServerConfig::default();
        assert_eq!(server.page_viewed_url(), "/waiter/viewed/");

        server.app_prefix = "/media".to_string();
        assert_eq!(server.page_viewed_url(), "/media/viewed/");

        server.app_prefix = "/".to_string();
        assert_eq!(server.page_viewed_url(), "/viewed/");

        server.viewed_url = Some("https://media.example/waiter/viewed/".to_string());
        assert_eq!(
            server.page_viewed_url(),
            "https://media.example/waiter/viewed/"
        );
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("WAITER_BASE_PATH", "/data/media");
            std::env::set_var("WAITER_MEDIA_DIRS", "Films, Series");
            std::env::set_var("WAITER_MINIMUM_FILE_SIZE", "42");
            std::env::set_var("WAITER_USE_OFFLOAD", "true");
            std::env::set_var("WAITER_REQUEST_TIMEOUT", "3");
            std::env::set_var("WAITER_VIEWED_URL", "/gateway/viewed/");
            std::env::set_var("MEDIAVIEWER_VIEWED_URL", "http://viewer.local/ajaxviewed/");
        }

        let config = WaiterConfig::from_env();

        assert_eq!(config.media.base_path, PathBuf::from("/data/media"));
        assert_eq!(
            config.media.media_dirs,
            vec![PathBuf::from("Films"), PathBuf::from("Series")]
        );
        assert_eq!(config.media.minimum_file_size, 42);
        assert_eq!(config.server.delivery_mode, DeliveryMode::Offload);
        assert_eq!(config.remote.request_timeout, Duration::from_secs(3));
        assert_eq!(config.server.page_viewed_url(), "/gateway/viewed/");
        assert_eq!(config.remote.viewed_url, "http://viewer.local/ajaxviewed/");

        // Cleanup
        unsafe {
            std::env::remove_var("WAITER_BASE_PATH");
            std::env::remove_var("WAITER_MEDIA_DIRS");
            std::env::remove_var("WAITER_MINIMUM_FILE_SIZE");
            std::env::remove_var("WAITER_USE_OFFLOAD");
            std::env::remove_var("WAITER_REQUEST_TIMEOUT");
            std::env::remove_var("WAITER_VIEWED_URL");
            std::env::remove_var("MEDIAVIEWER_VIEWED_URL");
        }
    }
}
