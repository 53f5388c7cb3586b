//! Image resolution for Markdown image references.
//!
//! An [`ImageResolver`] turns the URL of a Markdown image node into
//! [`ImageData`]. The built-in [`DefaultImageResolver`] reads local files
//! and delegates remote URLs to a caller-supplied [`ImageFetcher`]; it never
//! performs network I/O on its own.
//!
//! # Example
//!
//! ```no_run
//! use mdpatch::resolve::{DefaultImageResolver, ImageResolver, ImageResolverOptions};
//!
//! # async fn run() -> mdpatch::Result<()> {
//! let resolver = DefaultImageResolver::new(
//!     ImageResolverOptions::new()
//!         .with_base_dir("./assets")
//!         .with_default_size(300, 200),
//! );
//! let image = resolver.resolve("logo.png").await?;
//! assert_eq!(image.width, 300);
//! # Ok(())
//! # }
//! ```

mod cache;
mod default;
mod fetch;
mod options;

pub use cache::CachedImageResolver;
pub use default::{is_remote_url, DefaultImageResolver};
pub use fetch::{FnFetcher, ImageFetcher};
pub use options::{ImageResolverOptions, DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH};

use crate::error::Result;
use crate::model::ImageData;
use async_trait::async_trait;
use std::sync::Arc;

/// Capability that resolves an image reference to image data.
///
/// Implement this trait to plug in a custom lookup (asset store, cache,
/// test stub). Implementations must be shareable across concurrent
/// resolutions.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Resolve one image URL or path.
    async fn resolve(&self, url: &str) -> Result<ImageData>;
}

#[async_trait]
impl<R: ImageResolver + ?Sized> ImageResolver for Arc<R> {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        (**self).resolve(url).await
    }
}
