//! Thumbnail inlining: fetch a listing image and embed it as base64.

use crate::error::{Result, ScrapeError};
use crate::scrapers::http::{self, BROWSER_USER_AGENT};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Turn a protocol-relative or host-relative image reference into an
/// absolute URL. Absolute references are returned unchanged.
pub fn resolve_image_url(raw: &str, base: &Url) -> Result<String> {
    if raw.starts_with("//") {
        return Ok(format!("https:{raw}"));
    }
    if raw.starts_with('/') {
        return base
            .join(raw)
            .map(String::from)
            .map_err(|source| ScrapeError::Url {
                url: raw.to_string(),
                source,
            });
    }
    Ok(raw.to_string())
}

/// Fetch an image and return its body as standard base64.
pub async fn fetch_image_base64(
    client: &Client,
    cancel: &CancellationToken,
    raw_url: &str,
    base: &Url,
) -> Result<String> {
    let url = resolve_image_url(raw_url, base)?;
    debug!("Fetching image {}", url);

    let request = client.get(&url).header(USER_AGENT, BROWSER_USER_AGENT);
    let response = http::send(cancel, &url, request).await?;
    http::ensure_ok(&url, &response)?;
    let bytes = http::read_bytes(cancel, &url, response).await?;

    Ok(BASE64_STANDARD.encode(bytes))
}

/// Best-effort variant used while building a part.
///
/// Any failure except cancellation is logged and yields `None`, so the part
/// is still produced without an image.
pub async fn inline_image(
    client: &Client,
    cancel: &CancellationToken,
    raw_url: &str,
    base: &Url,
    source: &str,
    part_id: &str,
) -> Result<Option<String>> {
    match fetch_image_base64(client, cancel, raw_url, base).await {
        Ok(encoded) => Ok(Some(encoded)),
        Err(ScrapeError::Cancelled) => Err(ScrapeError::Cancelled),
        Err(e) => {
            warn!("[{}] failed to fetch image for part {}: {}", source, part_id, e);
            Ok(None)
        }
    }
}
