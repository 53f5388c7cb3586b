//! # mdpatch
//!
//! Patch placeholders in DOCX templates with content written in Markdown.
//!
//! A template contains literal tokens such as `{{summary}}`. Each token is
//! replaced by the paragraphs, text runs and inline images projected from a
//! Markdown source. Images are resolved from local paths or, through a
//! caller-supplied fetch function, from remote URLs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mdpatch::MarkdownPatcher;
//!
//! #[tokio::main]
//! async fn main() -> mdpatch::Result<()> {
//!     let template = std::fs::read("template.docx")?;
//!
//!     let output = MarkdownPatcher::new()
//!         .with_patch("summary", "Quarterly results with ![chart](chart.png)")
//!         .with_base_dir("./assets")
//!         .patch(&template)
//!         .await?;
//!
//!     std::fs::write("report.docx", output.into_bytes())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Parse**: Markdown → [`markdown::MarkdownTree`] (GFM tables,
//!   strikethrough, task lists, footnotes)
//! - **Project**: tree → [`model::Patch`]; distinct image URLs resolve
//!   concurrently, output keeps source order
//! - **Apply**: [`model::PatchSet`] → [`engine::PatchEngine`], by default
//!   the built-in [`engine::DocxEngine`]
//!
//! Only paragraphs, text and images are projected. Headings, lists, tables
//! and inline formatting other than plain text are skipped.

pub mod detect;
pub mod engine;
pub mod error;
pub mod markdown;
pub mod model;
pub mod patch;
pub mod project;
pub mod resolve;

// Re-export commonly used types
pub use detect::{detect_package, is_package_bytes, PackageFormat};
pub use engine::{
    ApplyOptions, DocxEngine, OutputType, PatchEngine, PatchOutput, PlaceholderDelimiters,
};
pub use error::{BoxError, Error, Result, TemplateError};
pub use markdown::{parse_markdown, MarkdownTree};
pub use model::{
    ContentNode, ImageData, ImageFormat, ImageRunNode, ParagraphNode, Patch, PatchSet, PatchType,
    RunNode, TextRunNode,
};
pub use patch::{
    build_patch_set, patch_document_with_markdown, patch_document_with_markdown_using,
    MarkdownPatchOptions,
};
pub use resolve::{
    CachedImageResolver, DefaultImageResolver, ImageFetcher, ImageResolver, ImageResolverOptions,
};

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Convert one Markdown source into a document patch.
///
/// # Example
///
/// ```no_run
/// use mdpatch::{markdown_to_patch, ImageResolverOptions};
///
/// # async fn run() -> mdpatch::Result<()> {
/// let options = ImageResolverOptions::new().with_base_dir("./assets");
/// let patch = markdown_to_patch("Hello ![logo](logo.png)", &options).await?;
/// assert_eq!(patch.image_count(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn markdown_to_patch(markdown: &str, options: &ImageResolverOptions) -> Result<Patch> {
    let tree = parse_markdown(markdown);
    let resolver = DefaultImageResolver::new(options.clone());
    project::project(&tree, &resolver).await
}

/// Patch a template file and return the patched bytes.
///
/// Relative image paths resolve against the template's directory.
///
/// # Example
///
/// ```no_run
/// use std::collections::HashMap;
///
/// # async fn run() -> mdpatch::Result<()> {
/// let mut patches = HashMap::new();
/// patches.insert("body".to_string(), "Some *text*".to_string());
/// let bytes = mdpatch::patch_file("template.docx", patches).await?;
/// std::fs::write("output.docx", bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn patch_file<P: AsRef<Path>>(
    path: P,
    markdown_patches: HashMap<String, String>,
) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf);

    let mut resolver_options = ImageResolverOptions::new();
    if let Some(dir) = base_dir {
        resolver_options = resolver_options.with_base_dir(dir);
    }

    let options = MarkdownPatchOptions::new(data)
        .with_patches(markdown_patches)
        .with_image_resolver_options(resolver_options);
    Ok(patch_document_with_markdown(options).await?.into_bytes())
}

/// Builder for patching templates with Markdown.
///
/// A configured patcher can be applied to any number of templates.
///
/// # Example
///
/// ```no_run
/// use mdpatch::{MarkdownPatcher, BoxError};
///
/// # async fn run(template: Vec<u8>) -> mdpatch::Result<()> {
/// let output = MarkdownPatcher::new()
///     .with_patch("intro", "Welcome!")
///     .with_patch("logo", "![logo](https://example.com/logo.png)")
///     .with_fetch_fn(|url: String| async move {
///         Err::<Vec<u8>, BoxError>(format!("offline: {url}").into())
///     })
///     .with_delimiters("[[", "]]")
///     .without_styles()
///     .patch(&template)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct MarkdownPatcher {
    markdown_patches: HashMap<String, String>,
    resolver_options: ImageResolverOptions,
    apply_options: ApplyOptions,
    share_image_cache: bool,
    engine: Arc<dyn PatchEngine>,
    resolver: Option<Arc<dyn ImageResolver>>,
}

impl MarkdownPatcher {
    /// Create a new patcher builder.
    pub fn new() -> Self {
        Self {
            markdown_patches: HashMap::new(),
            resolver_options: ImageResolverOptions::default(),
            apply_options: ApplyOptions::default(),
            share_image_cache: false,
            engine: Arc::new(DocxEngine::new()),
            resolver: None,
        }
    }

    /// Add the Markdown for a placeholder.
    pub fn with_patch(mut self, name: impl Into<String>, markdown: impl Into<String>) -> Self {
        self.markdown_patches.insert(name.into(), markdown.into());
        self
    }

    /// Set the directory relative image paths resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resolver_options = self.resolver_options.with_base_dir(dir);
        self
    }

    /// Set the fetch function for remote images.
    pub fn with_fetch_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<u8>, BoxError>> + Send + 'static,
    {
        self.resolver_options = self.resolver_options.with_fetch_fn(f);
        self
    }

    /// Set the size given to every image, in pixels.
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.resolver_options = self.resolver_options.with_default_size(width, height);
        self
    }

    /// Replace the image resolver options.
    pub fn with_resolver_options(mut self, options: ImageResolverOptions) -> Self {
        self.resolver_options = options;
        self
    }

    /// Resolve images with a custom resolver instead of the default one.
    pub fn with_resolver(mut self, resolver: Arc<dyn ImageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the placeholder delimiters.
    pub fn with_delimiters(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.apply_options = self
            .apply_options
            .with_delimiters(PlaceholderDelimiters::new(start, end));
        self
    }

    /// Do not copy the placeholder's run formatting onto inserted content.
    pub fn without_styles(mut self) -> Self {
        self.apply_options = self.apply_options.with_keep_original_styles(false);
        self
    }

    /// Replace only the first occurrence of each placeholder.
    pub fn first_only(mut self) -> Self {
        self.apply_options = self.apply_options.with_recursive(false);
        self
    }

    /// Set the output type.
    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.apply_options = self.apply_options.with_output_type(output_type);
        self
    }

    /// Resolve each image URL once across all placeholders.
    pub fn with_shared_image_cache(mut self) -> Self {
        self.share_image_cache = true;
        self
    }

    /// Use a different document engine.
    pub fn with_engine(mut self, engine: Arc<dyn PatchEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Build the patch set without applying it.
    pub async fn build(&self) -> Result<PatchSet> {
        build_patch_set(&self.markdown_patches, self.resolver()).await
    }

    /// Patch a template.
    pub async fn patch(&self, template: &[u8]) -> Result<PatchOutput> {
        let options = self.options_for(template);
        patch::patch_document_with_resolver(self.engine.as_ref(), self.resolver(), options).await
    }

    /// Patch a template file.
    pub async fn patch_file<P: AsRef<Path>>(&self, path: P) -> Result<PatchOutput> {
        let template = tokio::fs::read(path).await?;
        self.patch(&template).await
    }

    fn options_for(&self, template: &[u8]) -> MarkdownPatchOptions {
        let mut options = MarkdownPatchOptions::new(template)
            .with_image_resolver_options(self.resolver_options.clone())
            .with_output_type(self.apply_options.output_type)
            .with_keep_original_styles(self.apply_options.keep_original_styles)
            .with_recursive(self.apply_options.recursive)
            .with_shared_image_cache(self.share_image_cache);
        options.markdown_patches = self.markdown_patches.clone();
        options.placeholder_delimiters = self.apply_options.placeholder_delimiters.clone();
        options
    }

    fn resolver(&self) -> Arc<dyn ImageResolver> {
        match &self.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => patch::resolver_for(&self.options_for(&[])),
        }
    }
}

impl Default for MarkdownPatcher {
    fn default() -> Self {
        Self::new()
    }
}
