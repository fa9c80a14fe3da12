//! Routing and strategy behaviour through the layer, with virtual time.

mod common;

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{CacheStorage, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use common::{FakeOrigin, ORIGIN};
use core_cache::{CacheLayer, MemoryCacheStorage};
use core_runtime::config::CoreConfig;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mock! {
    pub Origin {}

    #[async_trait::async_trait]
    impl HttpClient for Origin {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn url(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

fn layer_with(origin: Arc<FakeOrigin>, api_timeout: Duration) -> (CacheLayer, Arc<MemoryCacheStorage>) {
    let storage = Arc::new(MemoryCacheStorage::new());
    let config = CoreConfig::builder()
        .version("v1")
        .origin(ORIGIN)
        .api_timeout(api_timeout)
        .http_client(origin)
        .build()
        .unwrap();
    (CacheLayer::new(config, storage.clone()), storage)
}

#[tokio::test(start_paused = true)]
async fn test_network_first_timeout_serves_cache_then_refreshes() {
    let origin = FakeOrigin::new();
    origin.serve("/api/playlists", "application/json", r#"{"v":1}"#);
    let (layer, storage) = layer_with(origin.clone(), Duration::from_millis(50));

    let first = layer.handle(HttpRequest::get(url("/api/playlists"))).await;
    assert_eq!(first.text().unwrap(), r#"{"v":1}"#);

    origin.serve_with(
        "/api/playlists",
        200,
        "application/json",
        r#"{"v":2}"#,
        Duration::from_secs(5),
    );

    let started = Instant::now();
    let second = layer.handle(HttpRequest::get(url("/api/playlists"))).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(second.text().unwrap(), r#"{"v":1}"#);

    // The losing fetch keeps running and lands in the cache
    tokio::time::sleep(Duration::from_secs(6)).await;
    let cache = storage.open("api-v1").await.unwrap();
    let refreshed = cache.get(&url("/api/playlists")).await.unwrap().unwrap();
    assert_eq!(refreshed.text().unwrap(), r#"{"v":2}"#);
}

#[tokio::test(start_paused = true)]
async fn test_network_first_timeout_without_cache_is_503() {
    let origin = FakeOrigin::new();
    origin.serve_with(
        "/api/history",
        200,
        "application/json",
        "[]",
        Duration::from_secs(30),
    );
    let (layer, _) = layer_with(origin, Duration::from_secs(5));

    // History is a heavy endpoint with a longer budget
    let started = Instant::now();
    let response = layer.handle(HttpRequest::get(url("/api/history"))).await;

    assert_eq!(response.status, 503);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_network_first_fast_answer_wins() {
    let origin = FakeOrigin::new();
    origin.serve("/api/profile", "application/json", r#"{"name":"a"}"#);
    let (layer, storage) = layer_with(origin, Duration::from_secs(5));

    let response = layer.handle(HttpRequest::get(url("/api/profile"))).await;

    assert_eq!(response.status, 200);
    let cache = storage.open("api-v1").await.unwrap();
    assert!(cache.get(&url("/api/profile")).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate_serves_stale_then_updates() {
    let origin = FakeOrigin::new();
    origin.serve("/api/thumbnails/1.jpg", "image/jpeg", b"old".to_vec());
    let (layer, _) = layer_with(origin.clone(), Duration::from_secs(5));

    let first = layer.handle(HttpRequest::get(url("/api/thumbnails/1.jpg"))).await;
    assert_eq!(first.body.as_ref(), b"old");

    origin.serve_with(
        "/api/thumbnails/1.jpg",
        200,
        "image/jpeg",
        b"new".to_vec(),
        Duration::from_millis(200),
    );

    let started = Instant::now();
    let stale = layer.handle(HttpRequest::get(url("/api/thumbnails/1.jpg"))).await;
    assert_eq!(stale.body.as_ref(), b"old");
    assert!(started.elapsed() < Duration::from_millis(200));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let fresh = layer.handle(HttpRequest::get(url("/api/thumbnails/1.jpg"))).await;
    assert_eq!(fresh.body.as_ref(), b"new");
    assert_eq!(origin.calls_for("/api/thumbnails/1.jpg"), 3);
}

#[tokio::test]
async fn test_stale_while_revalidate_offline_miss_is_503() {
    let origin = FakeOrigin::new();
    origin.set_offline(true);
    let (layer, _) = layer_with(origin, Duration::from_secs(5));

    let response = layer.handle(HttpRequest::get(url("/api/thumbnails/9.jpg"))).await;

    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn test_auth_requests_bypass_cache() {
    let mut origin = MockOrigin::new();
    origin
        .expect_execute()
        .withf(|request| request.url.ends_with("/api/auth/session"))
        .times(2)
        .returning(|_| Ok(HttpResponse::new(200).with_body(r#"{"user":"a"}"#)));

    let storage = Arc::new(MemoryCacheStorage::new());
    let config = CoreConfig::builder()
        .version("v1")
        .origin(ORIGIN)
        .http_client(Arc::new(origin))
        .build()
        .unwrap();
    let layer = CacheLayer::new(config, storage.clone());

    // Same key left behind by an earlier non-auth read
    let api = storage.open("api-v1").await.unwrap();
    api.put(&url("/api/auth/session"), HttpResponse::new(200).with_body("stale"))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = layer.handle(HttpRequest::get(url("/api/auth/session"))).await;
        assert_eq!(response.text().unwrap(), r#"{"user":"a"}"#);
    }

    assert_eq!(api.keys().await.unwrap(), vec![url("/api/auth/session")]);
    let untouched = api.get(&url("/api/auth/session")).await.unwrap().unwrap();
    assert_eq!(untouched.body.as_ref(), b"stale");
}

#[tokio::test]
async fn test_auth_offline_is_json_503() {
    let mut origin = MockOrigin::new();
    origin
        .expect_execute()
        .returning(|_| Err(BridgeError::NetworkUnavailable("down".to_string())));

    let config = CoreConfig::builder()
        .version("v1")
        .http_client(Arc::new(origin))
        .build()
        .unwrap();
    let layer = CacheLayer::new(config, Arc::new(MemoryCacheStorage::new()));

    let response = layer
        .handle(HttpRequest::new(HttpMethod::Post, "/api/auth/login"))
        .await;

    assert_eq!(response.status, 503);
    let body: serde_json::Value = response.json().unwrap();
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_api_mutation_is_never_cached() {
    let origin = FakeOrigin::new();
    origin.serve("/api/playlists", "application/json", "{}");
    let (layer, storage) = layer_with(origin.clone(), Duration::from_secs(5));

    layer
        .handle(HttpRequest::new(HttpMethod::Post, url("/api/playlists")))
        .await;

    assert!(!storage.has("api-v1").await.unwrap()
        || storage.open("api-v1").await.unwrap().keys().await.unwrap().is_empty());
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn test_install_precaches_and_offline_navigation_falls_back() {
    let origin = FakeOrigin::new();
    origin.serve("/", "text/html", "<html>shell</html>");
    origin.serve("/static/app.js", "text/javascript", "app()");
    let storage = Arc::new(MemoryCacheStorage::new());
    let config = CoreConfig::builder()
        .version("v1")
        .origin(ORIGIN)
        .precache_paths(["/", "/static/app.js", "/static/missing.css"])
        .http_client(origin.clone())
        .build()
        .unwrap();
    let layer = CacheLayer::new(config, storage);

    let report = layer.install().await;
    assert_eq!(report.precached, vec![url("/"), url("/static/app.js")]);
    assert_eq!(report.failed, vec![url("/static/missing.css")]);
    assert!(!report.is_complete());

    origin.set_offline(true);

    let page = layer
        .handle(HttpRequest::get(url("/albums/42")).header("Accept", "text/html"))
        .await;
    assert_eq!(page.status, 200);
    assert_eq!(page.text().unwrap(), "<html>shell</html>");

    let script = layer.handle(HttpRequest::get(url("/static/app.js"))).await;
    assert_eq!(script.text().unwrap(), "app()");

    let missing = layer.handle(HttpRequest::get(url("/static/other.css"))).await;
    assert_eq!(missing.status, 503);
}
