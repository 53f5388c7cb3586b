//! Caller-supplied remote fetching.

use crate::error::BoxError;
use async_trait::async_trait;
use std::future::Future;

/// Fetches the bytes behind a remote image URL.
///
/// mdpatch ships no implementation that touches the network; remote
/// images resolve only when the caller provides one.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the raw bytes at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError>;
}

/// Adapter turning an async closure into an [`ImageFetcher`].
///
/// # Example
///
/// ```
/// use mdpatch::resolve::FnFetcher;
/// use mdpatch::error::BoxError;
///
/// let fetcher = FnFetcher::new(|url: String| async move {
///     Ok::<_, BoxError>(url.into_bytes())
/// });
/// ```
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F> {
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFetcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> ImageFetcher for FnFetcher<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        (self.f)(url.to_string()).await
    }
}
