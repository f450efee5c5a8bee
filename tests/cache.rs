use std::time::SystemTime;
use thumbgate::cache::{CachedImage, DiskCache, ImageCache};
use thumbgate::config::{ImageType, TYPE_TAG_LEN};

fn temp_cache(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("thumbgate-test-cache-{}", name))
}

#[tokio::test]
async fn missing_key_is_none() {
    let cache = DiskCache::new(temp_cache("missing"));
    let key = cache.key_for("https://example.com/nothing.jpg");
    assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn key_is_deterministic_and_collision_resistant() {
    let cache = DiskCache::new(temp_cache("keys"));
    let a = cache.key_for("https://example.com/a.jpg");
    let b = cache.key_for("https://example.com/b.jpg");
    assert_eq!(a, cache.key_for("https://example.com/a.jpg"));
    assert_ne!(a, b);
    // sha256 hex
    assert_eq!(a.len(), 64);
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let dir = temp_cache("round-trip");
    let cache = DiskCache::new(dir.clone());
    let key = cache.key_for("https://example.com/cat.png");

    let image = CachedImage {
        image_type: ImageType::Png,
        timestamp: SystemTime::now(),
        data: vec![1, 2, 3, 4, 5],
    };
    cache.put(&key, &image).await.unwrap();

    let got = cache.get(&key).await.unwrap().expect("entry should exist");
    assert_eq!(got.image_type, ImageType::Png);
    assert_eq!(got.data, vec![1, 2, 3, 4, 5]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn file_layout_is_tag_then_payload() {
    let dir = temp_cache("layout");
    let cache = DiskCache::new(dir.clone());
    let key = cache.key_for("https://example.com/anim.gif");

    let image = CachedImage {
        image_type: ImageType::Gif,
        timestamp: SystemTime::now(),
        data: b"GIF89a-payload".to_vec(),
    };
    cache.put(&key, &image).await.unwrap();

    let raw = tokio::fs::read(dir.join(format!("{}.csh", key))).await.unwrap();
    assert_eq!(&raw[..TYPE_TAG_LEN], b"gif");
    assert_eq!(&raw[TYPE_TAG_LEN..], b"GIF89a-payload");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn rewrite_with_identical_bytes_is_harmless() {
    let dir = temp_cache("rewrite");
    let cache = DiskCache::new(dir.clone());
    let key = cache.key_for("https://example.com/same.jpg");

    let image = CachedImage {
        image_type: ImageType::Jpeg,
        timestamp: SystemTime::now(),
        data: vec![0xFF, 0xD8, 0xFF],
    };
    cache.put(&key, &image).await.unwrap();
    cache.put(&key, &image).await.unwrap();

    let got = cache.get(&key).await.unwrap().unwrap();
    assert_eq!(got.data, vec![0xFF, 0xD8, 0xFF]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn unknown_tag_reads_as_miss() {
    let dir = temp_cache("bad-tag");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let cache = DiskCache::new(dir.clone());
    let key = cache.key_for("https://example.com/odd.bin");

    tokio::fs::write(dir.join(format!("{}.csh", key)), b"zzzpayload")
        .await
        .unwrap();

    assert!(cache.get(&key).await.unwrap().is_none());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
