//! Shared resolution cache across placeholder entries.

use super::ImageResolver;
use crate::error::Result;
use crate::model::ImageData;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// Resolver wrapper that resolves each URL at most once.
///
/// Concurrent requests for the same URL wait on a single in-flight
/// resolution. A failed resolution is not cached, so a later request
/// retries it.
pub struct CachedImageResolver<R> {
    inner: R,
    cells: Mutex<HashMap<String, Arc<OnceCell<ImageData>>>>,
}

impl<R: ImageResolver> CachedImageResolver<R> {
    /// Wrap a resolver.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Get the wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of URLs resolved successfully so far.
    pub fn cached_count(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    fn cell(&self, url: &str) -> Arc<OnceCell<ImageData>> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells.entry(url.to_string()).or_default().clone()
    }
}

#[async_trait]
impl<R: ImageResolver> ImageResolver for CachedImageResolver<R> {
    async fn resolve(&self, url: &str) -> Result<ImageData> {
        let cell = self.cell(url);
        let image = cell.get_or_try_init(|| self.inner.resolve(url)).await?;
        Ok(image.clone())
    }
}
