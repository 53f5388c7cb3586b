//! Projection of a Markdown tree into document patch content.
//!
//! Projection runs in three passes:
//!
//! 1. collect every image URL in the tree, depth-first, duplicates included;
//! 2. resolve the distinct URLs concurrently, failing on the first error;
//! 3. fold the tree into paragraphs using only the resolved map.
//!
//! Output order follows the tree, never resolution completion order.

use crate::error::{Error, Result};
use crate::markdown::{Block, Inline, MarkdownTree};
use crate::model::{ContentNode, ImageData, ImageFormat, ParagraphNode, Patch};
use crate::resolve::ImageResolver;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Resolved images keyed by the URL they were referenced with.
pub type ResolvedImages = HashMap<String, Arc<ImageData>>;

/// Project a Markdown tree into a document patch, resolving its images.
///
/// # Example
///
/// ```no_run
/// use mdpatch::markdown::parse_markdown;
/// use mdpatch::project::project;
/// use mdpatch::resolve::{DefaultImageResolver, ImageResolverOptions};
///
/// # async fn run() -> mdpatch::Result<()> {
/// let tree = parse_markdown("Test with ![image](test.png)");
/// let resolver = DefaultImageResolver::new(ImageResolverOptions::new().with_base_dir("assets"));
/// let patch = project(&tree, &resolver).await?;
/// assert_eq!(patch.image_count(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn project(tree: &MarkdownTree, resolver: &dyn ImageResolver) -> Result<Patch> {
    let urls = tree.image_urls();
    let images = resolve_images(&urls, resolver).await?;
    Ok(project_resolved(tree, &images))
}

/// Resolve the distinct URLs of `urls` concurrently.
///
/// Each distinct URL is resolved exactly once. Any failure fails the
/// whole call; siblings still in flight are dropped.
pub async fn resolve_images(
    urls: &[&str],
    resolver: &dyn ImageResolver,
) -> Result<ResolvedImages> {
    let mut seen = HashSet::new();
    let distinct: Vec<&str> = urls.iter().copied().filter(|url| seen.insert(*url)).collect();

    if distinct.is_empty() {
        return Ok(ResolvedImages::new());
    }

    log::debug!(
        "Resolving {} distinct images ({} references)",
        distinct.len(),
        urls.len()
    );

    let resolved = try_join_all(distinct.into_iter().map(|url| async move {
        let image = resolver.resolve(url).await?;
        Ok::<_, Error>((url.to_string(), Arc::new(image)))
    }))
    .await?;

    Ok(resolved.into_iter().collect())
}

/// Fold a tree into a patch using already-resolved images.
///
/// Only paragraphs, text and images are projected; every other node is
/// skipped. A paragraph whose children are all skipped still yields an
/// empty paragraph.
pub fn project_resolved(tree: &MarkdownTree, images: &ResolvedImages) -> Patch {
    let children = tree
        .children
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph { children } => {
                Some(ContentNode::from(project_paragraph(children, images)))
            }
            _ => None,
        })
        .collect();

    Patch::document(children)
}

fn project_paragraph(inlines: &[Inline], images: &ResolvedImages) -> ParagraphNode {
    let mut paragraph = ParagraphNode::new();

    for inline in inlines {
        match inline {
            Inline::Text { value } => paragraph.add_text(value.as_str()),
            Inline::Image { url, .. } => match images.get(url) {
                Some(image) => paragraph.add_image(Arc::clone(image), ImageFormat::default()),
                None => log::warn!("Skipping unresolved image '{}'", url),
            },
            _ => {}
        }
    }

    paragraph
}
