//! Integration tests for tree-to-patch projection.

use async_trait::async_trait;
use mdpatch::markdown::parse_markdown;
use mdpatch::model::{ImageData, RunNode};
use mdpatch::project::project;
use mdpatch::resolve::ImageResolver;
use mdpatch::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Resolver with per-URL latency that records call and completion order.
#[derive(Default)]
struct RecordingResolver {
    delays: HashMap<String, u64>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
}

impl RecordingResolver {
    fn with_delay(mut self, url: &str, millis: u64) -> Self {
        self.delays.insert(url.to_string(), millis);
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageResolver for RecordingResolver {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(&millis) = self.delays.get(url) {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        if self.failing.iter().any(|f| f == url) {
            return Err(Error::ImageFileNotFound(url.into()));
        }

        self.completed.lock().unwrap().push(url.to_string());
        Ok(ImageData::new(url.as_bytes().to_vec(), 600, 400))
    }
}

fn image_urls(paragraph_runs: &[RunNode]) -> Vec<String> {
    paragraph_runs
        .iter()
        .filter_map(|run| match run {
            RunNode::Image(img) => Some(String::from_utf8(img.bytes().to_vec()).unwrap()),
            RunNode::Text(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_order_follows_source_not_completion() {
    let resolver = RecordingResolver::default()
        .with_delay("slow.png", 60)
        .with_delay("medium.png", 30);
    let tree = parse_markdown("![a](slow.png) ![b](medium.png) ![c](fast.png)");

    let patch = project(&tree, &resolver).await.unwrap();

    assert_eq!(resolver.completed(), vec!["fast.png", "medium.png", "slow.png"]);
    let paragraph = patch.paragraphs().next().unwrap();
    assert_eq!(
        image_urls(&paragraph.children),
        vec!["slow.png", "medium.png", "fast.png"]
    );
}

#[tokio::test]
async fn test_duplicate_urls_resolve_once_and_share_data() {
    let resolver = RecordingResolver::default();
    let tree = parse_markdown("![one](same.png) text ![two](same.png)\n\n![three](same.png)");

    let patch = project(&tree, &resolver).await.unwrap();
    assert_eq!(resolver.calls(), vec!["same.png"]);

    let images: Vec<_> = patch
        .paragraphs()
        .flat_map(|p| p.images())
        .map(|img| Arc::clone(&img.image))
        .collect();
    assert_eq!(images.len(), 3);
    assert!(Arc::ptr_eq(&images[0], &images[1]));
    assert!(Arc::ptr_eq(&images[0], &images[2]));
}

#[tokio::test]
async fn test_heading_is_skipped_and_siblings_keep_order() {
    let resolver = RecordingResolver::default();
    let tree = parse_markdown("before\n\n# Heading ![h](heading.png)\n\nafter ![p](para.png)");

    let patch = project(&tree, &resolver).await.unwrap();

    // Heading images are still resolved
    let mut calls = resolver.calls();
    calls.sort();
    assert_eq!(calls, vec!["heading.png", "para.png"]);

    assert_eq!(patch.children.len(), 2);
    let paragraphs: Vec<_> = patch.paragraphs().collect();
    assert_eq!(paragraphs[0].plain_text(), "before");
    assert_eq!(paragraphs[1].plain_text(), "after ");
    assert_eq!(image_urls(&paragraphs[1].children), vec!["para.png"]);
}

#[tokio::test]
async fn test_images_inside_formatting_are_resolved_but_not_projected() {
    let resolver = RecordingResolver::default();
    let tree = parse_markdown("see [![badge](badge.png)](https://example.com) and *![e](em.png)*");

    let patch = project(&tree, &resolver).await.unwrap();

    assert_eq!(resolver.calls().len(), 2);
    assert_eq!(patch.image_count(), 0);
    assert_eq!(patch.plain_text(), "see  and ");
}

#[tokio::test]
async fn test_first_failure_fails_projection() {
    let resolver = RecordingResolver::default()
        .with_delay("slow.png", 5_000)
        .failing("broken.png");
    let tree = parse_markdown("![a](slow.png) ![b](broken.png)");

    let result = tokio::time::timeout(Duration::from_secs(2), project(&tree, &resolver))
        .await
        .expect("projection should fail without waiting for slow siblings");

    assert!(matches!(result, Err(Error::ImageFileNotFound(_))));
    assert!(resolver.completed().is_empty());
}

#[tokio::test]
async fn test_no_images_means_no_resolver_calls() {
    let resolver = RecordingResolver::default();
    let tree = parse_markdown("Hello **world**");

    let patch = project(&tree, &resolver).await.unwrap();

    assert!(resolver.calls().is_empty());
    assert_eq!(patch.plain_text(), "Hello ");
}

#[tokio::test]
async fn test_empty_markdown_gives_empty_patch() {
    let resolver = RecordingResolver::default();
    let patch = project(&parse_markdown(""), &resolver).await.unwrap();
    assert!(patch.is_empty());
}
