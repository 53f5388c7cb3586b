//! Image resolver configuration.

use super::fetch::{FnFetcher, ImageFetcher};
use crate::error::BoxError;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Default display width for resolved images, in pixels.
pub const DEFAULT_IMAGE_WIDTH: u32 = 600;

/// Default display height for resolved images, in pixels.
pub const DEFAULT_IMAGE_HEIGHT: u32 = 400;

/// Options for resolving Markdown image references.
#[derive(Clone)]
pub struct ImageResolverOptions {
    /// Directory relative paths are resolved against (working directory if unset)
    pub base_dir: Option<PathBuf>,

    /// Fetcher for remote URLs; remote images fail without one
    pub fetcher: Option<Arc<dyn ImageFetcher>>,

    /// Width assigned to every resolved image
    pub default_width: u32,

    /// Height assigned to every resolved image
    pub default_height: u32,
}

impl ImageResolverOptions {
    /// Create new resolver options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base directory for relative paths.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the remote fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the remote fetcher from an async closure.
    pub fn with_fetch_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
    {
        self.with_fetcher(Arc::new(FnFetcher::new(f)))
    }

    /// Set the default width.
    pub fn with_default_width(mut self, width: u32) -> Self {
        self.default_width = width;
        self
    }

    /// Set the default height.
    pub fn with_default_height(mut self, height: u32) -> Self {
        self.default_height = height;
        self
    }

    /// Set both default dimensions.
    pub fn with_default_size(self, width: u32, height: u32) -> Self {
        self.with_default_width(width).with_default_height(height)
    }

    /// Check if a remote fetcher is configured.
    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }
}

impl Default for ImageResolverOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            fetcher: None,
            default_width: DEFAULT_IMAGE_WIDTH,
            default_height: DEFAULT_IMAGE_HEIGHT,
        }
    }
}

impl std::fmt::Debug for ImageResolverOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolverOptions")
            .field("base_dir", &self.base_dir)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<fetcher>"))
            .field("default_width", &self.default_width)
            .field("default_height", &self.default_height)
            .finish()
    }
}
