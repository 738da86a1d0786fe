//! Test utilities: a handwritten mock of the [`Fetcher`] trait.
//!
//! Uses `Arc<Mutex<_>>` for interior mutability so cloned mocks share one
//! response queue across the code under test and the assertions.

use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::traits::Fetcher;

/// Mock fetcher that pops queued responses and records requested URLs.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element; when empty, a
    /// default HTML string is returned.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// Every URL passed to `fetch`, in call order.
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}
