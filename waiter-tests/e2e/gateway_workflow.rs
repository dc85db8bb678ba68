//! Gateway workflow tests: resolve, list, authorize, deliver

use std::sync::Arc;

use axum::http::StatusCode;
use waiter_core::test_fixtures::{
    create_media_file, create_media_file_with_contents, create_media_root,
};
use waiter_core::{DeliveryMode, TokenLookup, WaiterConfig};

use super::support::{
    MockMediaViewer, body_bytes, body_json, episode_token, gateway, get, get_range, movie_token,
};

const EPISODE_BYTES: &[u8] = b"0123456789abcdefghij";

#[tokio::test]
async fn test_single_file_token_lists_and_downloads() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "tv shows/Some Show/ep1.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "g1",
        TokenLookup::Found(episode_token("g1", "tv shows/Some Show", "ep1.mp4")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let listing = get(&app, "/waiter/dir/g1/").await;
    assert_eq!(listing.status(), StatusCode::OK);
    let page = body_json(listing).await;
    assert_eq!(page["view"], "display");
    let files = page["context"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "ep1.mp4");
    assert_eq!(files[0]["streamable"], true);
    assert_eq!(files[0]["streaming_path"], "/waiter/stream/g1/ep1.mp4");
    assert_eq!(files[0]["serve_path"], "/waiter/file/g1/ep1.mp4");
    assert_eq!(
        page["context"]["next_link"],
        "http://127.0.0.1:8000/mediaviewer/autoplaydownloadlink/100/"
    );
    assert!(page["context"]["previous_link"].is_null());

    let download = get(&app, "/waiter/file/g1/ep1.mp4").await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()["accept-ranges"], "bytes");
    assert_eq!(body_bytes(download).await, EPISODE_BYTES);

    let clicks = api.clicks.lock();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].filename, "ep1.mp4");
    assert_eq!(clicks[0].size, EPISODE_BYTES.len() as u64);
    assert_eq!(clicks[0].user_id, 3);
    assert_eq!(clicks[0].token_id, 99);
}

#[tokio::test]
async fn test_movie_directory_drops_small_files() {
    let root = create_media_root();
    create_media_file(root.path(), "Movies/Some Movie/b.mkv", 12_000_000);
    create_media_file(root.path(), "Movies/Some Movie/extras/a.mp4", 10_000_000);
    create_media_file(root.path(), "Movies/Some Movie/sample.mp4", 9_999_999);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "m1",
        TokenLookup::Found(movie_token("m1", "Movies", "Some Movie")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api);

    let page = body_json(get(&app, "/waiter/dir/m1/").await).await;
    let files = page["context"]["files"].as_array().unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["filename"], "a.mp4");
    assert_eq!(files[0]["serve_path"], "/waiter/file/m1/extras/a.mp4");
    assert_eq!(files[0]["streaming_path"], "/waiter/stream/m1/extras/a.mp4");
    assert_eq!(files[1]["filename"], "b.mkv");
    assert_eq!(files[1]["streamable"], false);
    assert!(files[1]["streaming_path"].is_null());
    assert_eq!(files[1]["size_human"], "11.4MB");
}

#[tokio::test]
async fn test_direct_range_request_returns_partial_content() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "tv shows/Some Show/ep1.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "g1",
        TokenLookup::Found(episode_token("g1", "tv shows/Some Show", "ep1.mp4")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let response = get_range(&app, "/waiter/file/g1/ep1.mp4", "bytes=10-14").await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 10-14/20");
    assert_eq!(response.headers()["content-length"], "5");
    assert_eq!(body_bytes(response).await, b"abcde");
    assert_eq!(api.clicks.lock()[0].size, 5);
}

#[tokio::test]
async fn test_malformed_range_serves_whole_file() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "tv shows/Some Show/ep1.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "g1",
        TokenLookup::Found(episode_token("g1", "tv shows/Some Show", "ep1.mp4")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api);

    let response = get_range(&app, "/waiter/file/g1/ep1.mp4", "bytes=-5").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, EPISODE_BYTES);
}

#[tokio::test]
async fn test_offload_mode_redirects_to_proxy() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "Movies/Some Movie/movie.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "m1",
        TokenLookup::Found(movie_token("m1", "Movies", "Some Movie")),
    ));
    let mut config = WaiterConfig::for_testing(root.path());
    config.server.delivery_mode = DeliveryMode::Offload;
    config.server.offload_strip_depth = root.path().components().count();
    let app = gateway(config, api.clone());

    let response = get_range(&app, "/waiter/file/m1/movie.mp4", "bytes=0-9").await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()["x-accel-redirect"],
        "/download/Movies/Some%20Movie/movie.mp4"
    );
    assert_eq!(response.headers()["content-range"], "bytes 0-9/20");
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert!(
        response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"movie.mp4\"")
    );
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(api.clicks.lock().len(), 1);
}

#[tokio::test]
async fn test_tracking_outage_does_not_block_download() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "tv shows/Some Show/ep1.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::failing_tracking().with_token(
        "g1",
        TokenLookup::Found(episode_token("g1", "tv shows/Some Show", "ep1.mp4")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let response = get(&app, "/waiter/file/g1/ep1.mp4").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, EPISODE_BYTES);
    // Tracking is retried with the configured policy before giving up
    assert_eq!(api.clicks.lock().len(), 2);
}

#[tokio::test]
async fn test_rejected_token_text_is_shown_verbatim() {
    let root = create_media_root();
    let api = Arc::new(MockMediaViewer::new().with_token(
        "expired",
        TokenLookup::Rejected {
            message: "This token has expired".to_string(),
        },
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api);

    let response = get(&app, "/waiter/dir/expired/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = body_json(response).await;
    assert_eq!(page["view"], "error");
    assert_eq!(page["context"]["error_text"], "This token has expired");
}

#[tokio::test]
async fn test_unknown_token_is_invalid() {
    let root = create_media_root();
    let app = gateway(
        WaiterConfig::for_testing(root.path()),
        Arc::new(MockMediaViewer::new()),
    );

    let page = body_json(get(&app, "/waiter/file/nobody/").await).await;

    assert_eq!(page["context"]["error_text"], "This token is invalid");
}

#[tokio::test]
async fn test_service_outage_shows_generic_error() {
    let root = create_media_root();
    let api = Arc::new(MockMediaViewer::unreachable());
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let response = get(&app, "/waiter/dir/g1/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = body_json(response).await;
    assert_eq!(page["context"]["error_text"], "An error has occurred");
    assert_eq!(*api.fetches.lock(), 2);
}

#[tokio::test]
async fn test_traversal_outside_grant_is_unauthorized() {
    let root = create_media_root();
    create_media_file_with_contents(root.path(), "tv shows/Some Show/ep1.mp4", EPISODE_BYTES);
    create_media_file_with_contents(root.path(), "tv shows/Other Show/ep1.mp4", EPISODE_BYTES);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "g1",
        TokenLookup::Found(episode_token("g1", "tv shows/Some Show", "ep1.mp4")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let response = get(&app, "/waiter/file/g1/..%2FOther%20Show%2Fep1.mp4").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = body_json(response).await;
    assert_eq!(page["context"]["error_text"], "Access is unauthorized!");
    assert_eq!(page["context"]["theme"], "dark");
    assert!(api.clicks.lock().is_empty());
}

#[tokio::test]
async fn test_movie_token_on_single_file_route() {
    let root = create_media_root();
    let api = Arc::new(MockMediaViewer::new().with_token(
        "m1",
        TokenLookup::Found(movie_token("m1", "Movies", "Some Movie")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api);

    let page = body_json(get(&app, "/waiter/file/m1/").await).await;

    assert_eq!(page["context"]["error_text"], "Invalid URL for movie type");
}

#[tokio::test]
async fn test_stream_page_for_existing_and_missing_files() {
    let root = create_media_root();
    create_media_file(root.path(), "Movies/Some Movie/movie.mp4", 10_000_000);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "m1",
        TokenLookup::Found(movie_token("m1", "Movies", "Some Movie")),
    ));
    let app = gateway(WaiterConfig::for_testing(root.path()), api);

    let response = get(&app, "/waiter/stream/m1/movie.mp4/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["view"], "video");
    assert_eq!(page["context"]["video_file"], "/waiter/file/m1/movie.mp4");
    assert_eq!(page["context"]["viewed_url"], "/waiter/viewed/");
    assert_eq!(page["context"]["guid"], "m1");

    let missing = body_json(get(&app, "/waiter/stream/m1/nope.mp4").await).await;
    assert_eq!(missing["context"]["error_text"], "Bad path or filename");
}

#[tokio::test]
async fn test_video_page_links_follow_custom_prefix() {
    let root = create_media_root();
    create_media_file(root.path(), "Movies/Some Movie/movie.mp4", 10_000_000);
    let api = Arc::new(MockMediaViewer::new().with_token(
        "m1",
        TokenLookup::Found(movie_token("m1", "Movies", "Some Movie")),
    ));
    let mut config = WaiterConfig::for_testing(root.path());
    config.server.app_prefix = "/media".to_string();
    let app = gateway(config, api.clone());

    let page = body_json(get(&app, "/media/stream/m1/movie.mp4").await).await;
    assert_eq!(page["context"]["video_file"], "/media/file/m1/movie.mp4");
    let viewed_url = page["context"]["viewed_url"].as_str().unwrap().to_string();
    assert_eq!(viewed_url, "/media/viewed/");

    let response = get(&app, &format!("{viewed_url}m1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*api.viewed.lock(), vec!["m1".to_string()]);
}

#[tokio::test]
async fn test_viewed_is_forwarded() {
    let root = create_media_root();
    let api = Arc::new(MockMediaViewer::new());
    let app = gateway(WaiterConfig::for_testing(root.path()), api.clone());

    let response = get(&app, "/waiter/viewed/g1").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Viewed set successfully");
    assert_eq!(*api.viewed.lock(), vec!["g1".to_string()]);
}

#[tokio::test]
async fn test_status_reflects_mounts() {
    let root = create_media_root();
    let app = gateway(
        WaiterConfig::for_testing(root.path()),
        Arc::new(MockMediaViewer::new()),
    );

    let healthy = get(&app, "/waiter/status").await;
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(body_json(healthy).await["status"], true);

    std::fs::remove_dir(root.path().join("tv shows")).unwrap();

    let unhealthy = get(&app, "/waiter/status/").await;
    assert_eq!(unhealthy.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(unhealthy).await["status"], false);
}
