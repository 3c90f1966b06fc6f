//! Pre-flight request: find out what the server can do before any piece work.
use crate::layout::DownloadTarget;
use anyhow::{Context, Result, anyhow};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, USER_AGENT};

/// Issues one GET against `url` and reads `Accept-Ranges` and
/// `Content-Length` off the response headers. The body is never read.
///
/// # Errors
///
/// Returns an error if:
/// * The request cannot be sent.
/// * The server returns a non-success status code.
/// * `Content-Length` is present but not a number.
pub async fn probe_target(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
) -> Result<DownloadTarget> {
    let response = client
        .get(url)
        .header(USER_AGENT, user_agent)
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Request failed. Status Code: {}",
            response.status()
        ));
    }

    let headers = response.headers();

    // "none" is the one value that explicitly denies range support.
    let supports_range = headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && !v.eq_ignore_ascii_case("none")
        })
        .unwrap_or(false);

    let total_size = match headers.get(CONTENT_LENGTH) {
        Some(value) => Some(
            value
                .to_str()?
                .trim()
                .parse::<u64>()
                .context("Invalid Content-Length in response header")?,
        ),
        None => None,
    };

    Ok(DownloadTarget {
        url: url.to_string(),
        total_size,
        supports_range,
        user_agent: user_agent.to_string(),
    })
}
