//! Integration tests for image resolution.

use mdpatch::resolve::{
    CachedImageResolver, DefaultImageResolver, ImageResolver, ImageResolverOptions,
};
use mdpatch::{BoxError, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_local_relative_path_uses_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("logo.png"), b"\x89PNG-data").unwrap();

    let resolver =
        DefaultImageResolver::new(ImageResolverOptions::new().with_base_dir(dir.path()));
    let image = resolver.resolve("logo.png").await.unwrap();

    assert_eq!(image.data, b"\x89PNG-data");
    assert_eq!((image.width, image.height), (600, 400));
}

#[tokio::test]
async fn test_local_absolute_path_ignores_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abs.png");
    std::fs::write(&path, b"abs").unwrap();

    let resolver =
        DefaultImageResolver::new(ImageResolverOptions::new().with_base_dir("/test/base"));
    let image = resolver.resolve(path.to_str().unwrap()).await.unwrap();
    assert_eq!(image.data, b"abs");
}

#[tokio::test]
async fn test_local_nested_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img").join("a.png"), b"nested").unwrap();

    let resolver =
        DefaultImageResolver::new(ImageResolverOptions::new().with_base_dir(dir.path()));
    let image = resolver.resolve("img/a.png").await.unwrap();
    assert_eq!(image.data, b"nested");
}

#[tokio::test]
async fn test_configured_dimensions_apply_to_every_image() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), b"a").unwrap();

    let resolver = DefaultImageResolver::new(
        ImageResolverOptions::new()
            .with_base_dir(dir.path())
            .with_default_width(320),
    );
    let image = resolver.resolve("a.png").await.unwrap();
    assert_eq!((image.width, image.height), (320, 400));
}

#[tokio::test]
async fn test_missing_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let resolver =
        DefaultImageResolver::new(ImageResolverOptions::new().with_base_dir(dir.path()));

    let err = resolver.resolve("nope.png").await.unwrap_err();
    match err {
        Error::ImageFileNotFound(path) => assert_eq!(path, dir.path().join("nope.png")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_remote_uses_fetcher_without_filesystem() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    // Base dir does not exist: remote resolution must not touch it
    let resolver = DefaultImageResolver::new(
        ImageResolverOptions::new()
            .with_base_dir("/definitely/not/here")
            .with_fetch_fn(move |url: String| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(url, "https://example.com/image.png");
                    Ok::<_, BoxError>(b"remote-bytes".to_vec())
                }
            }),
    );

    let image = resolver
        .resolve("https://example.com/image.png")
        .await
        .unwrap();
    assert_eq!(image.data, b"remote-bytes");
    assert_eq!((image.width, image.height), (600, 400));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_without_fetcher_is_not_configured() {
    let resolver = DefaultImageResolver::default();
    let err = resolver
        .resolve("http://example.com/a.png")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ImageNotConfigured { ref url } if url == "http://example.com/a.png"));
}

#[tokio::test]
async fn test_cached_resolver_reads_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once.png");
    std::fs::write(&path, b"first").unwrap();

    let cached = CachedImageResolver::new(DefaultImageResolver::new(
        ImageResolverOptions::new().with_base_dir(dir.path()),
    ));
    let first = cached.resolve("once.png").await.unwrap();

    // A later change on disk is not observed through the cache
    std::fs::write(&path, b"second").unwrap();
    let second = cached.resolve("once.png").await.unwrap();

    assert_eq!(first.data, b"first");
    assert_eq!(second.data, b"first");
    assert_eq!(cached.cached_count(), 1);
}
