//! Batch patching of a template from named Markdown sources.
//!
//! Every placeholder entry is parsed and projected concurrently against one
//! shared resolver. The first failure fails the whole call, tagged with the
//! placeholder it came from; nothing is written to the document until every
//! entry has succeeded.

mod options;

pub use options::MarkdownPatchOptions;

use crate::engine::{DocxEngine, PatchEngine, PatchOutput};
use crate::error::{Error, Result};
use crate::markdown::parse_markdown;
use crate::model::PatchSet;
use crate::project::project;
use crate::resolve::{CachedImageResolver, DefaultImageResolver, ImageResolver};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Build one patch per placeholder entry.
///
/// # Errors
///
/// Returns [`Error::Patch`] wrapping the first resolution failure.
pub async fn build_patch_set(
    markdown_patches: &HashMap<String, String>,
    resolver: Arc<dyn ImageResolver>,
) -> Result<PatchSet> {
    let resolver = resolver.as_ref();

    let entries = markdown_patches.iter().map(|(name, markdown)| async move {
        let tree = parse_markdown(markdown);
        let patch = project(&tree, resolver)
            .await
            .map_err(|e| e.for_placeholder(name.as_str()))?;
        Ok::<_, Error>((name.clone(), patch))
    });

    let patches = try_join_all(entries).await?;
    Ok(patches.into_iter().collect())
}

/// Patch a DOCX template with Markdown content.
///
/// # Example
///
/// ```no_run
/// use mdpatch::patch::{patch_document_with_markdown, MarkdownPatchOptions};
/// use mdpatch::resolve::ImageResolverOptions;
///
/// # async fn run() -> mdpatch::Result<()> {
/// let template = std::fs::read("template.docx")?;
/// let options = MarkdownPatchOptions::new(template)
///     .with_patch("content", "Hello **world** with ![logo](logo.png)")
///     .with_image_resolver_options(ImageResolverOptions::new().with_base_dir("./assets"));
///
/// let output = patch_document_with_markdown(options).await?;
/// std::fs::write("output.docx", output.into_bytes())?;
/// # Ok(())
/// # }
/// ```
pub async fn patch_document_with_markdown(options: MarkdownPatchOptions) -> Result<PatchOutput> {
    patch_document_with_markdown_using(&DocxEngine::new(), options).await
}

/// Patch a template with Markdown content using a specific engine.
pub async fn patch_document_with_markdown_using(
    engine: &dyn PatchEngine,
    options: MarkdownPatchOptions,
) -> Result<PatchOutput> {
    let resolver = resolver_for(&options);
    patch_document_with_resolver(engine, resolver, options).await
}

/// Patch a template resolving images through a caller-supplied resolver.
///
/// `image_resolver_options` and `share_image_cache` are ignored.
pub async fn patch_document_with_resolver(
    engine: &dyn PatchEngine,
    resolver: Arc<dyn ImageResolver>,
    options: MarkdownPatchOptions,
) -> Result<PatchOutput> {
    log::debug!(
        "Building {} patches for {} engine",
        options.markdown_patches.len(),
        engine.name()
    );

    let patches = build_patch_set(&options.markdown_patches, resolver).await?;
    let output = engine.apply_patches(&options.data, &patches, &options.apply_options())?;
    Ok(output)
}

/// Build the resolver described by the options.
pub fn resolver_for(options: &MarkdownPatchOptions) -> Arc<dyn ImageResolver> {
    let resolver = DefaultImageResolver::new(options.image_resolver_options.clone());
    if options.share_image_cache {
        Arc::new(CachedImageResolver::new(resolver))
    } else {
        Arc::new(resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageData;
    use async_trait::async_trait;

    struct FailingResolver;

    #[async_trait]
    impl ImageResolver for FailingResolver {
        async fn resolve(&self, url: &str) -> Result<ImageData> {
            if url.starts_with("bad") {
                return Err(Error::ImageFileNotFound(url.into()));
            }
            Ok(ImageData::new(vec![0], 10, 10))
        }
    }

    #[tokio::test]
    async fn test_build_patch_set_per_entry() {
        let mut sources = HashMap::new();
        sources.insert("a".to_string(), "first ![x](ok.png)".to_string());
        sources.insert("b".to_string(), "second".to_string());

        let patches = build_patch_set(&sources, Arc::new(FailingResolver))
            .await
            .unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches["a"].image_count(), 1);
        assert_eq!(patches["b"].plain_text(), "second");
    }

    #[tokio::test]
    async fn test_failure_names_placeholder() {
        let mut sources = HashMap::new();
        sources.insert("good".to_string(), "fine".to_string());
        sources.insert("broken".to_string(), "![x](bad.png)".to_string());

        let err = build_patch_set(&sources, Arc::new(FailingResolver))
            .await
            .unwrap_err();
        assert_eq!(err.placeholder(), Some("broken"));
        assert!(matches!(err.root(), Error::ImageFileNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_sources() {
        let patches = build_patch_set(&HashMap::new(), Arc::new(FailingResolver))
            .await
            .unwrap();
        assert!(patches.is_empty());
    }
}
