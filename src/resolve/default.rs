//! Built-in resolver for local files and fetcher-backed remote URLs.

use super::options::ImageResolverOptions;
use super::ImageResolver;
use crate::error::{Error, Result};
use crate::model::ImageData;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Resolver for local paths and remote URLs.
///
/// Every resolved image gets the configured default dimensions; image
/// bytes are never inspected. Each call performs at most one file read or
/// one fetch, with no retries and no caching.
#[derive(Debug, Clone, Default)]
pub struct DefaultImageResolver {
    options: ImageResolverOptions,
}

impl DefaultImageResolver {
    /// Create a resolver from options.
    pub fn new(options: ImageResolverOptions) -> Self {
        Self { options }
    }

    /// Get the resolver options.
    pub fn options(&self) -> &ImageResolverOptions {
        &self.options
    }

    /// Compute the filesystem path a local reference resolves to.
    ///
    /// Absolute paths are returned unchanged; relative paths are joined to
    /// the base directory, or the working directory when none is set.
    pub fn local_path(&self, reference: &str) -> Result<PathBuf> {
        let path = Path::new(reference);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let base = match &self.options.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(base.join(path))
    }

    async fn read_local(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.local_path(reference)?;
        log::debug!("Resolving local image {}", path.display());

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            _ => return Err(Error::ImageFileNotFound(path)),
        }

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ImageFileNotFound(path.clone()),
            _ => Error::Io(e),
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let fetcher = self
            .options
            .fetcher
            .as_ref()
            .ok_or_else(|| Error::ImageNotConfigured {
                url: url.to_string(),
            })?;

        log::debug!("Fetching remote image {}", url);
        fetcher
            .fetch(url)
            .await
            .map_err(|source| Error::ImageFetchFailed {
                url: url.to_string(),
                source,
            })
    }
}

#[async_trait]
impl ImageResolver for DefaultImageResolver {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        let data = if is_remote_url(url) {
            self.fetch_remote(url).await?
        } else {
            self.read_local(url).await?
        };

        Ok(ImageData::new(
            data,
            self.options.default_width,
            self.options.default_height,
        ))
    }
}

/// Check if a reference is a remote URL (absolute, with an authority).
///
/// Everything else, including Windows drive paths, is a local path.
pub fn is_remote_url(reference: &str) -> bool {
    Url::parse(reference)
        .map(|url| url.has_host() && !url.host_str().unwrap_or_default().is_empty())
        .unwrap_or(false)
}
