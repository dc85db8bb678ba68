//! Partial-content delivery of authorized files
//!
//! The responder sizes the file, resolves the byte window, reports the download
//! to the media viewer and hands the transfer to a [`FileDelivery`] chosen once
//! at startup: either streaming bytes itself or instructing the reverse proxy
//! in front of it to do so.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, SET_COOKIE,
};
use axum::http::{Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};
use waiter_core::{
    DownloadClick, MediaViewerApi, RangeWindow, RetryPolicy, TokenRecord, compute_window,
    with_retry,
};

/// Header nginx reads to serve an internal location on our behalf
pub const X_ACCEL_REDIRECT: &str = "X-Accel-Redirect";

/// Errors delivering a file.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The file disappeared between authorization and delivery
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// The file exists but could not be read
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Header values could not be encoded
    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ServeError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ServeError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ServeError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// One authorized download.
#[derive(Debug, Clone)]
pub struct ServeRequest<'a> {
    /// Absolute path of the file on disk
    pub full_path: PathBuf,
    /// Name offered to the client and reported to the media viewer
    pub filename: String,
    /// Token the request was authorized with
    pub token: &'a TokenRecord,
    /// Raw `Range` header, if the client sent one
    pub range_header: Option<String>,
}

/// Strategy for putting a byte window of a file on the wire.
#[async_trait]
pub trait FileDelivery: Send + Sync {
    /// Builds the response for `window` of the file at `path`.
    ///
    /// # Errors
    ///
    /// - `ServeError::NotFound` - If the file vanished
    /// - `ServeError::Io` - If the file could not be opened or positioned
    /// - `ServeError::Response` - If a header value is not representable
    async fn deliver(
        &self,
        path: &Path,
        filename: &str,
        window: &RangeWindow,
    ) -> Result<Response<Body>, ServeError>;
}

/// Delegates the transfer to a reverse proxy through `X-Accel-Redirect`.
///
/// Never touches file contents. Always answers 206 with the window's
/// `Content-Range`, leaving range handling on the wire to the proxy.
#[derive(Debug, Clone)]
pub struct OffloadDelivery {
    location: String,
    strip_depth: usize,
}

impl OffloadDelivery {
    /// Creates an offload delivery redirecting into `location`.
    ///
    /// `strip_depth` is how many leading `/`-separated pieces of the absolute
    /// file path are replaced by `location`.
    pub fn new(location: &str, strip_depth: usize) -> Self {
        Self {
            location: location.trim_end_matches('/').to_string(),
            strip_depth,
        }
    }

    /// Internal location the proxy should serve for `path`.
    ///
    /// With the default depth of 3, `/mnt/media/Movies/a.mp4` becomes
    /// `/download/Movies/a.mp4`. Segments are percent-encoded.
    pub fn redirect_path(&self, path: &Path) -> String {
        let path = path.to_string_lossy();
        let remainder = path
            .splitn(self.strip_depth + 1, '/')
            .last()
            .unwrap_or_default();

        let encoded = remainder
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!("{}/{encoded}", self.location)
    }
}

#[async_trait]
impl FileDelivery for OffloadDelivery {
    async fn deliver(
        &self,
        path: &Path,
        filename: &str,
        window: &RangeWindow,
    ) -> Result<Response<Body>, ServeError> {
        let redirect = self.redirect_path(path);
        let disposition = content_disposition(filename);
        let content_range = window.content_range();

        debug!("{}: {}", X_ACCEL_REDIRECT, redirect);
        debug!("Content-Disposition: {}", disposition);
        debug!("Content-Range: {}", content_range);

        let response = Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_TYPE, content_type(filename))
            .header(X_ACCEL_REDIRECT, redirect)
            .header(CONTENT_DISPOSITION, disposition)
            .header(CONTENT_RANGE, content_range)
            .body(Body::empty())?;

        Ok(response)
    }
}

/// Streams file bytes from this process.
///
/// Requests without a usable range get the whole file with 200; ranged requests
/// get exactly the window with 206. Bytes are read lazily, so a client that
/// disconnects stops the read.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDelivery;

#[async_trait]
impl FileDelivery for DirectDelivery {
    async fn deliver(
        &self,
        path: &Path,
        filename: &str,
        window: &RangeWindow,
    ) -> Result<Response<Body>, ServeError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ServeError::from_io(path, e))?;

        let builder = Response::builder()
            .header(CONTENT_TYPE, content_type(filename))
            .header(CONTENT_DISPOSITION, content_disposition(filename))
            .header(CONTENT_LENGTH, window.length)
            .header(SET_COOKIE, "fileDownload=true; Path=/")
            .header(SET_COOKIE, "path=/; Path=/");

        let response = if window.partial {
            file.seek(SeekFrom::Start(window.start_byte))
                .await
                .map_err(|e| ServeError::from_io(path, e))?;

            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_RANGE, window.content_range())
                .body(Body::from_stream(ReaderStream::new(file.take(window.length))))?
        } else {
            builder
                .status(StatusCode::OK)
                .body(Body::from_stream(ReaderStream::new(file)))?
        };

        Ok(response)
    }
}

/// Reports downloads to the media viewer.
///
/// Reports are best effort: a failure is logged and the download proceeds.
#[derive(Clone)]
pub struct DownloadTracker {
    api: Arc<dyn MediaViewerApi>,
    policy: RetryPolicy,
}

impl DownloadTracker {
    /// Creates a tracker reporting through `api` with `policy` retries.
    pub fn new(api: Arc<dyn MediaViewerApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    /// Records that `size` bytes of `filename` were requested under `token`.
    pub async fn track(&self, token: &TokenRecord, filename: &str, size: u64) {
        let click = DownloadClick {
            user_id: token.user_id,
            token_id: token.token_id,
            filename: filename.to_string(),
            size,
        };

        match with_retry("report_download", self.policy, || {
            self.api.report_download(&click)
        })
        .await
        {
            Ok(()) => debug!(guid = %token.guid, filename, size, "Download recorded"),
            Err(e) => error!(guid = %token.guid, error = %e, "Download tracking failed"),
        }
    }
}

/// Serves authorized files with byte-range support.
#[derive(Clone)]
pub struct PartialContentResponder {
    delivery: Arc<dyn FileDelivery>,
    tracker: DownloadTracker,
}

impl PartialContentResponder {
    /// Creates a responder delivering through `delivery`.
    pub fn new(delivery: Arc<dyn FileDelivery>, tracker: DownloadTracker) -> Self {
        Self { delivery, tracker }
    }

    /// Serves the window of `request.full_path` selected by its `Range` header.
    ///
    /// The download is reported before the response is built; the report
    /// records what was requested, not what reached the client.
    ///
    /// # Errors
    ///
    /// - `ServeError::NotFound` - If the path does not exist or is a directory
    /// - `ServeError::Io` - If the file cannot be inspected or read
    /// - `ServeError::Response` - If the response headers cannot be built
    pub async fn serve(&self, request: ServeRequest<'_>) -> Result<Response<Body>, ServeError> {
        let metadata = tokio::fs::metadata(&request.full_path)
            .await
            .map_err(|e| ServeError::from_io(&request.full_path, e))?;
        if !metadata.is_file() {
            return Err(ServeError::NotFound {
                path: request.full_path,
            });
        }

        let window = compute_window(metadata.len(), request.range_header.as_deref());
        info!(
            guid = %request.token.guid,
            filename = %request.filename,
            start = window.start_byte,
            end = window.end_byte,
            total = window.total_size,
            "Serving file"
        );

        self.tracker
            .track(request.token, &request.filename, window.length)
            .await;

        self.delivery
            .deliver(&request.full_path, &request.filename, &window)
            .await
    }
}

fn content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use parking_lot::Mutex;
    use waiter_core::test_fixtures::{create_media_file_with_contents, create_media_root};
    use waiter_core::{RemoteError, TokenLookup};

    use super::*;

    #[derive(Default)]
    struct RecordingApi {
        clicks: Mutex<Vec<DownloadClick>>,
        fail: bool,
    }

    #[async_trait]
    impl MediaViewerApi for RecordingApi {
        async fn fetch_token(&self, _guid: &str) -> Result<TokenLookup, RemoteError> {
            Ok(TokenLookup::Missing)
        }

        async fn report_download(&self, click: &DownloadClick) -> Result<(), RemoteError> {
            self.clicks.lock().push(click.clone());
            if self.fail {
                Err(RemoteError::Status {
                    url: "http://mediaviewer/click".to_string(),
                    status: 503,
                })
            } else {
                Ok(())
            }
        }

        async fn mark_viewed(&self, _guid: &str) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn token() -> TokenRecord {
        TokenRecord {
            guid: "guid-1".to_string(),
            is_movie: false,
            path: "tv shows/Show".to_string(),
            filename: "ep1.mp4".to_string(),
            display_name: "Show".to_string(),
            user_id: 7,
            token_id: 11,
            theme: None,
            username: None,
            tv_id: None,
            tv_name: None,
            next_id: None,
            previous_id: None,
            binge_mode: false,
        }
    }

    fn responder(
        api: Arc<RecordingApi>,
        delivery: Arc<dyn FileDelivery>,
    ) -> PartialContentResponder {
        let tracker = DownloadTracker::new(api, RetryPolicy::new(3, std::time::Duration::ZERO));
        PartialContentResponder::new(delivery, tracker)
    }

    #[test]
    fn test_redirect_path_strips_mount_prefix() {
        let offload = OffloadDelivery::new("/download", 3);

        assert_eq!(
            offload.redirect_path(Path::new("/mnt/media/Movies/A/a.mp4")),
            "/download/Movies/A/a.mp4"
        );
        assert_eq!(
            offload.redirect_path(Path::new("/mnt/media/tv shows/S/e 1.mp4")),
            "/download/tv%20shows/S/e%201.mp4"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("a\"b.mp4"),
            "attachment; filename=\"a_b.mp4\"; filename*=UTF-8''a%22b.mp4"
        );
    }

    #[tokio::test]
    async fn test_direct_range_returns_exact_bytes() {
        let root = create_media_root();
        let path =
            create_media_file_with_contents(root.path(), "tv shows/Show/ep1.mp4", b"0123456789");
        let api = Arc::new(RecordingApi::default());
        let token = token();

        let response = responder(api.clone(), Arc::new(DirectDelivery))
            .serve(ServeRequest {
                full_path: path,
                filename: "ep1.mp4".to_string(),
                token: &token,
                range_header: Some("bytes=2-5".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes 2-5/10");
        assert_eq!(response.headers()[CONTENT_LENGTH], "4");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"2345");

        let clicks = api.clicks.lock();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].size, 4);
        assert_eq!(clicks[0].user_id, 7);
        assert_eq!(clicks[0].token_id, 11);
    }

    #[tokio::test]
    async fn test_direct_without_range_streams_whole_file() {
        let root = create_media_root();
        let path =
            create_media_file_with_contents(root.path(), "tv shows/Show/ep1.mp4", b"0123456789");
        let api = Arc::new(RecordingApi::default());
        let token = token();

        let response = responder(api, Arc::new(DirectDelivery))
            .serve(ServeRequest {
                full_path: path,
                filename: "ep1.mp4".to_string(),
                token: &token,
                range_header: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "video/mp4");
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"0123456789");
    }

    #[tokio::test]
    async fn test_tracking_failure_still_serves() {
        let root = create_media_root();
        let path = create_media_file_with_contents(root.path(), "tv shows/Show/ep1.mp4", b"abc");
        let api = Arc::new(RecordingApi {
            fail: true,
            ..Default::default()
        });
        let token = token();

        let response = responder(api.clone(), Arc::new(DirectDelivery))
            .serve(ServeRequest {
                full_path: path,
                filename: "ep1.mp4".to_string(),
                token: &token,
                range_header: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(api.clicks.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_offload_never_reads_the_file() {
        let root = create_media_root();
        let path = create_media_file_with_contents(root.path(), "Movies/A/a.mp4", b"0123456789");
        let api = Arc::new(RecordingApi::default());
        let token = token();

        let response = responder(api, Arc::new(OffloadDelivery::new("/download", 0)))
            .serve(ServeRequest {
                full_path: path,
                filename: "a.mp4".to_string(),
                token: &token,
                range_header: Some("bytes=0-4".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes 0-4/10");
        assert!(response.headers().contains_key(X_ACCEL_REDIRECT));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_offload_empty_file_reports_unsatisfied_range() {
        let root = create_media_root();
        let path = create_media_file_with_contents(root.path(), "Movies/A/empty.mp4", b"");
        let api = Arc::new(RecordingApi::default());
        let token = token();

        let response = responder(api, Arc::new(OffloadDelivery::new("/download", 0)))
            .serve(ServeRequest {
                full_path: path,
                filename: "empty.mp4".to_string(),
                token: &token,
                range_header: None,
            })
            .await
            .unwrap();

        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */0");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let api = Arc::new(RecordingApi::default());
        let token = token();

        let result = responder(api.clone(), Arc::new(DirectDelivery))
            .serve(ServeRequest {
                full_path: PathBuf::from("/does/not/exist.mp4"),
                filename: "exist.mp4".to_string(),
                token: &token,
                range_header: None,
            })
            .await;

        assert!(matches!(result, Err(ServeError::NotFound { .. })));
        assert!(api.clicks.lock().is_empty());
    }
}
