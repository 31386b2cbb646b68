use futures::stream::{self, StreamExt};
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::article::ArticleRecord;
use crate::util::{check_url, UrlPolicy, UrlValidationError};

const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024; // 20MB
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 3;
const MAX_REDIRECTS: usize = 3;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(u64),
    #[error("Invalid image URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
}

impl ContentError {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            ContentError::Network(e) => !e.is_redirect(),
            ContentError::Timeout => true,
            ContentError::HttpStatus(status) => *status >= 500,
            ContentError::ResponseTooLarge(_) | ContentError::InvalidUrl(_) => false,
        }
    }
}

#[derive(Debug, Error)]
enum RedirectError {
    #[error("Too many redirects (max 3)")]
    TooMany,
    #[error("Redirect loop detected")]
    Loop,
    #[error("Redirect target refused: {0}")]
    Refused(#[from] UrlValidationError),
}

/// Redirect policy for image fetches.
///
/// Every hop is held to the same URL check as the initial request, so a
/// public image URL cannot bounce the fetch onto a private host.
pub fn redirect_policy(policy: UrlPolicy) -> Policy {
    Policy::custom(move |attempt| {
        match check_redirect(attempt.url(), attempt.previous(), policy) {
            Ok(()) => {
                tracing::debug!(
                    from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
                    to = %attempt.url(),
                    hop = attempt.previous().len() + 1,
                    "Following redirect"
                );
                attempt.follow()
            }
            Err(e) => {
                tracing::warn!(to = %attempt.url(), error = %e, "Refusing image redirect");
                attempt.error(e)
            }
        }
    })
}

fn check_redirect(url: &Url, previous: &[Url], policy: UrlPolicy) -> Result<(), RedirectError> {
    if previous.len() >= MAX_REDIRECTS {
        return Err(RedirectError::TooMany);
    }
    if previous.iter().any(|prev| prev.as_str() == url.as_str()) {
        return Err(RedirectError::Loop);
    }
    check_url(url.as_str(), policy)?;
    Ok(())
}

/// Downloads an image and returns its size in bytes.
///
/// The body is counted as it streams and never buffered whole.
pub async fn fetch_image_length(
    client: &reqwest::Client,
    url: &str,
    policy: UrlPolicy,
) -> Result<u64, ContentError> {
    let url = check_url(url, policy)?;
    fetch_with_retry(client, &url).await
}

/// Fills in `image.length` for every article that has an image URL.
///
/// Fetches run concurrently, at most `concurrency` at a time, but the
/// returned articles keep their input order. A failed fetch leaves the
/// length unset.
pub async fn enrich_image_lengths(
    client: &reqwest::Client,
    articles: Vec<ArticleRecord>,
    concurrency: usize,
    policy: UrlPolicy,
) -> Vec<ArticleRecord> {
    stream::iter(articles)
        .map(|mut article| {
            let client = client.clone();
            async move {
                let Some(url) = article
                    .image
                    .as_ref()
                    .filter(|image| image.length.is_none())
                    .and_then(|image| image.url.clone())
                else {
                    return article;
                };

                match fetch_image_length(&client, &url, policy).await {
                    Ok(length) => {
                        if let Some(image) = article.image.as_mut() {
                            image.length = Some(length);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Failed to fetch article image, length left unset");
                    }
                }
                article
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Uses exponential backoff: 1s, 2s, 4s (max 3 retries).
async fn fetch_with_retry(client: &reqwest::Client, url: &Url) -> Result<u64, ContentError> {
    let mut retry_count = 0;

    loop {
        match fetch_once(client, url).await {
            Ok(length) => return Ok(length),
            Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                let delay = 1u64 << retry_count;
                tracing::debug!(
                    error = %e,
                    retry = retry_count + 1,
                    delay_secs = delay,
                    "Retrying image fetch after transient error"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(client: &reqwest::Client, url: &Url) -> Result<u64, ContentError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url.clone()).send())
        .await
        .map_err(|_| ContentError::Timeout)?
        .map_err(ContentError::Network)?;

    if !response.status().is_success() {
        return Err(ContentError::HttpStatus(response.status().as_u16()));
    }

    count_body_bytes(response, MAX_IMAGE_SIZE).await
}

async fn count_body_bytes(response: reqwest::Response, limit: u64) -> Result<u64, ContentError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut total: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        total = total.saturating_add(chunk.len() as u64);
        if total > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    Ok(total)
}
