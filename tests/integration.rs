use axum::body::Body;
use axum::http::{Request, StatusCode};
use thumbgate::cache::{DiskCache, ImageCache};
use thumbgate::codec::{compose_thumbnail_name, encode_locator};
use thumbgate::config::ThumbGateConfig;
use thumbgate::fetch::fetch_image;
use thumbgate::resolve::{ResolverTable, SourceResolver};
use thumbgate::router;
use thumbgate::ThumbGateError;
use tower::util::ServiceExt; // for `oneshot`

/// Helper to create a test config rooted in a unique temp directory
fn test_config(name: &str) -> ThumbGateConfig {
    // Disable rate limiting for tests
    std::env::set_var("DISABLE_RATE_LIMIT", "1");

    let root = std::env::temp_dir().join(format!("thumbgate-it-{}", name));
    ThumbGateConfig {
        cache_dir: root.join("cache"),
        public_dir: root.join("public"),
        cdn_base_url: None,
        ..ThumbGateConfig::default()
    }
}

/// Writes a small PNG to disk and returns its absolute path, which doubles
/// as a fetchable locator
async fn write_source_png(name: &str) -> std::path::PathBuf {
    let img = image::DynamicImage::new_rgb8(32, 24);
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let path = std::env::temp_dir().join(format!("thumbgate-it-src-{}.png", name));
    tokio::fs::write(&path, &png).await.unwrap();
    path
}

async fn cleanup(cfg: &ThumbGateConfig) {
    if let Some(root) = cfg.cache_dir.parent() {
        let _ = tokio::fs::remove_dir_all(root).await;
    }
}

#[tokio::test]
async fn sized_request_serves_jpeg() {
    let cfg = test_config("sized");
    let app = router(cfg.clone());
    let src = write_source_png("sized").await;

    let name = compose_thumbnail_name(src.to_str().unwrap(), Some(16), Some(16));
    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/thumb/{}", name))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..2], &[0xFF, 0xD8]);

    // The transformed output lands in the public dir for static serving
    assert!(cfg.public_dir.join(&name).exists());

    let _ = tokio::fs::remove_file(&src).await;
    cleanup(&cfg).await;
}

#[tokio::test]
async fn pass_through_serves_sniffed_type() {
    let cfg = test_config("pass");
    let app = router(cfg.clone());
    let src = write_source_png("pass").await;
    let url = src.to_str().unwrap().to_string();
    let source_bytes = tokio::fs::read(&src).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/thumb/{}.png", encode_locator(&url)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], &source_bytes[..]);

    // Side cache carries the true extension of the sniffed type
    assert!(cfg
        .public_dir
        .join(format!("{}.png", encode_locator(&url)))
        .exists());

    let _ = tokio::fs::remove_file(&src).await;
    cleanup(&cfg).await;
}

#[tokio::test]
async fn malformed_name_is_404_with_empty_body() {
    let cfg = test_config("malformed");
    let app = router(cfg.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/thumb/!!!not-base64!!!.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());

    cleanup(&cfg).await;
}

#[tokio::test]
async fn unreachable_source_is_404_and_never_cached() {
    let cfg = test_config("unreachable");
    let app = router(cfg.clone());

    let name = compose_thumbnail_name("/nonexistent/thumbgate-missing.png", Some(10), Some(10));
    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/thumb/{}", name))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // No cache entry may exist for a failed fetch
    let mut entries = 0;
    if let Ok(mut dir) = tokio::fs::read_dir(&cfg.cache_dir).await {
        while let Ok(Some(_)) = dir.next_entry().await {
            entries += 1;
        }
    }
    assert_eq!(entries, 0);

    cleanup(&cfg).await;
}

#[tokio::test]
async fn second_fetch_is_served_from_cache() {
    let cfg = test_config("cache-hit");
    let cache = DiskCache::new(cfg.cache_dir.clone());
    let src = write_source_png("cache-hit").await;
    let url = src.to_str().unwrap().to_string();

    let first = fetch_image(&url, &cfg, &cache).await.unwrap();

    // Remove the source: any second read must come from the cache
    tokio::fs::remove_file(&src).await.unwrap();

    let second = fetch_image(&url, &cfg, &cache).await.unwrap();
    assert_eq!(first.image_type, second.image_type);
    assert_eq!(first.data, second.data);

    cleanup(&cfg).await;
}

#[tokio::test]
async fn non_image_bytes_are_rejected_and_not_cached() {
    let cfg = test_config("not-image");
    let cache = DiskCache::new(cfg.cache_dir.clone());

    let src = std::env::temp_dir().join("thumbgate-it-src-not-image.txt");
    tokio::fs::write(&src, b"just some text, no magic numbers")
        .await
        .unwrap();
    let url = src.to_str().unwrap().to_string();

    match fetch_image(&url, &cfg, &cache).await {
        Err(ThumbGateError::UnrecognizedFormat) => {}
        other => panic!("expected UnrecognizedFormat, got {:?}", other.map(|i| i.image_type)),
    }

    let key = cache.key_for(&url);
    assert!(cache.get(&key).await.unwrap().is_none());

    let _ = tokio::fs::remove_file(&src).await;
    cleanup(&cfg).await;
}

#[tokio::test]
async fn health_endpoint_reports_service() {
    let cfg = test_config("health");
    let app = router(cfg.clone());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["service"], "thumbgate");

    cleanup(&cfg).await;
}

#[tokio::test]
async fn metrics_endpoint_is_prometheus_text() {
    let cfg = test_config("metrics");
    let app = router(cfg.clone());

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("thumbgate_cache_hits_total"));
    assert!(text.contains("thumbgate_download_errors_total"));

    cleanup(&cfg).await;
}

struct GalleryResolver;

#[async_trait::async_trait]
impl SourceResolver for GalleryResolver {
    fn matches(&self, url: &str) -> bool {
        url.contains("gallery.example.com")
    }

    async fn resolve(&self, url: &str) -> Vec<String> {
        vec![format!("{}/1.jpg", url), format!("{}/2.jpg", url)]
    }
}

#[tokio::test]
async fn resolver_table_dispatches_and_falls_back() {
    let mut table = ResolverTable::new();
    table.register(Box::new(GalleryResolver));

    let resolved = table.resolve("https://gallery.example.com/album").await;
    assert_eq!(
        resolved,
        vec![
            "https://gallery.example.com/album/1.jpg".to_string(),
            "https://gallery.example.com/album/2.jpg".to_string(),
        ]
    );

    // URLs no resolver claims pass through untouched
    let direct = table.resolve("https://elsewhere.example.net/cat.jpg").await;
    assert_eq!(direct, vec!["https://elsewhere.example.net/cat.jpg".to_string()]);
}
