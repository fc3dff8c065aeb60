//! Shared HTTP plumbing: client construction plus cancellation-aware
//! request helpers used by every site client.

use crate::config::HttpConfig;
use crate::error::{Result, ScrapeError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Deserializer};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Browser User-Agent sent with page and image requests.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:143.0) Gecko/20100101 Firefox/143.0";

/// Build the client every site client shares.
///
/// The connection pool inside [`Client`] is safe to use from concurrent
/// fetches, so one client can back several site clients.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    config.validate()?;

    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .danger_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(ref ua) = config.user_agent {
        builder = builder.user_agent(ua.clone());
    }

    builder.build().map_err(ScrapeError::Client)
}

/// Parse a site base URL, mapping failures to [`ScrapeError::Url`].
pub fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|source| ScrapeError::Url {
        url: raw.to_string(),
        source,
    })
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        result = fut => result,
    }
}

/// Send a request, racing it against the cancellation token.
pub async fn send(cancel: &CancellationToken, url: &str, request: RequestBuilder) -> Result<Response> {
    cancellable(cancel, async {
        request.send().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })
    })
    .await
}

/// Fail with [`ScrapeError::Status`] unless the response is 200 OK.
pub fn ensure_ok(url: &str, response: &Response) -> Result<()> {
    if response.status() != StatusCode::OK {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
            detail: String::new(),
        });
    }
    Ok(())
}

/// Read the full body as text.
pub async fn read_text(cancel: &CancellationToken, url: &str, response: Response) -> Result<String> {
    cancellable(cancel, async {
        response.text().await.map_err(|source| ScrapeError::Request {
            url: url.to_string(),
            source,
        })
    })
    .await
}

/// Read the full body as raw bytes.
pub async fn read_bytes(cancel: &CancellationToken, url: &str, response: Response) -> Result<Vec<u8>> {
    cancellable(cancel, async {
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|source| ScrapeError::Request {
                url: url.to_string(),
                source,
            })
    })
    .await
}

/// Decode a JSON body, attributing failures to `url`.
pub fn decode_json<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| ScrapeError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Field decoder that treats an explicit JSON `null` like a missing key.
///
/// Use together with `#[serde(default)]` on fields the backends sometimes
/// send as `null`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_with_default_config() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn build_client_rejects_invalid_config() {
        let config = HttpConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(build_client(&config), Err(ScrapeError::Config(_))));
    }

    #[tokio::test]
    async fn cancellable_returns_cancelled_when_token_fired() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(ScrapeError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellable_passes_through_result() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Item {
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
    }

    #[test]
    fn null_and_missing_fields_decode_to_default() {
        let null: Item = decode_json("https://x.test/a", r#"{"name":null}"#).unwrap();
        assert_eq!(null.name, "");
        let missing: Item = decode_json("https://x.test/a", "{}").unwrap();
        assert_eq!(missing.name, "");
        let set: Item = decode_json("https://x.test/a", r#"{"name":"Door"}"#).unwrap();
        assert_eq!(set.name, "Door");
    }

    #[test]
    fn null_as_default_still_rejects_wrong_types() {
        assert!(decode_json::<Item>("https://x.test/a", r#"{"name":5}"#).is_err());
    }

    #[test]
    fn decode_json_reports_url() {
        let err = decode_json::<serde_json::Value>("https://x.test/a", "{nope").unwrap_err();
        assert!(err.to_string().contains("https://x.test/a"));
    }
}
