//! Response handling shared by the HTTP adapters

use std::time::Duration;

use calrecon_domain::Result;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Response;

use crate::errors::status_error;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Pass successful responses through; map everything else onto the domain
/// error taxonomy, keeping a prefix of the body for the log.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    Err(status_error(status, retry_after, &body))
}

/// `Retry-After` in its delay-seconds form; HTTP-date values are ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}
