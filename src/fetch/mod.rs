//! Fetcher abstraction for asynchronously produced values
//!
//! A [`Fetcher`] is the injected collaborator that actually obtains a
//! value: an HTTP client, a database read, a test closure. The cache
//! invokes it at most once per miss and fans the outcome out to every
//! attached caller, so [`FetchError`] is cloneable.

pub mod http;

pub use http::JsonValueFetcher;

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Errors a fetch operation can settle with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be carried out (connection, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but did not contain a usable value
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The fetch task died before settling
    #[error("fetch aborted before settling")]
    Aborted,
}

/// An injected asynchronous source for a cacheable value
///
/// Implementations need no retry or backoff behavior of their own; a
/// failed fetch leaves the cache empty and the next request starts a
/// fresh attempt.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    /// Produce the value, or fail
    async fn fetch(&self) -> Result<T, FetchError>;
}

/// Adapter turning a closure into a [`Fetcher`]
///
/// Built with [`fetch_fn`]; mostly useful in tests and embeddings that
/// have no dedicated fetcher type.
#[derive(Clone)]
pub struct FetchFn<F>(F);

/// Wrap a `Fn() -> Future` closure as a [`Fetcher`]
pub fn fetch_fn<T, F, Fut>(f: F) -> FetchFn<F>
where
    T: Send,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    FetchFn(f)
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for FetchFn<F>
where
    T: Send,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        (self.0)().await
    }
}
