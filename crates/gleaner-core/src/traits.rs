use std::future::Future;

use crate::error::AppError;

/// Fetches the raw body of a URL.
///
/// The transport session (cookies, proxy, credentials, headers) lives behind
/// the implementation; the orchestrator only ever sees a body or a typed
/// error, so a failed request can never be confused with an empty page.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}
