use std::sync::Arc;

use crate::error::FetchError;
use crate::extract::Pipeline;
use crate::fetch::{FetchRequest, Fetcher};
use crate::truncate::truncate_chars;

/// Readable text of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResult {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub content: String,
    /// Content was cut to the request's character cap.
    pub truncated: bool,
}

/// Fetch, extract and truncate in one call.
#[derive(Clone)]
pub struct ContentClient {
    fetcher: Fetcher,
    pipeline: Arc<Pipeline>,
}

impl Default for ContentClient {
    fn default() -> Self {
        Self::new(Fetcher::default())
    }
}

impl ContentClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            pipeline: Arc::new(Pipeline::default()),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<ContentResult, FetchError> {
        let page = self.fetcher.fetch(request).await?;
        let final_url = page.final_url.to_string();
        let html = String::from_utf8_lossy(&page.body);
        let extracted = self.pipeline.extract(&html, &final_url);
        if extracted.content.trim().is_empty() {
            return Err(FetchError::Extraction { url: final_url });
        }
        let content = truncate_chars(&extracted.content, request.max_chars());
        let truncated = content.len() < extracted.content.len();
        tracing::debug!(
            url = request.url(),
            final_url = %final_url,
            chars = content.chars().count(),
            truncated,
            "content fetched"
        );
        Ok(ContentResult {
            url: request.url().to_string(),
            title: extracted.title,
            content: content.to_string(),
            final_url,
            truncated,
        })
    }
}

/// Fetches `url` with the default policy and resolver. `timeout_seconds`
/// below one is raised to one; a non-positive `max_chars` means no limit.
pub async fn fetch_content(
    url: &str,
    timeout_seconds: i64,
    max_chars: i64,
) -> Result<ContentResult, FetchError> {
    let request = FetchRequest::from_raw(url, timeout_seconds, max_chars);
    ContentClient::default().fetch(&request).await
}
