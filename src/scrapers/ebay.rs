use crate::config::{EbayCredentials, HttpConfig};
use crate::error::{Result, ScrapeError};
use crate::models::Part;
use crate::scrapers::http::{self, build_client, null_as_default, parse_base_url};
use crate::scrapers::image::inline_image;
use crate::scrapers::traits::SiteClient;
use crate::scrapers::types::SearchParams;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const SANDBOX_TOKEN_URL: &str = "https://api.sandbox.ebay.com/identity/v1/oauth2/token";
pub const SANDBOX_SEARCH_URL: &str = "https://api.sandbox.ebay.com/buy/browse/v1/item_summary/search";
pub const PROD_TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
pub const PROD_SEARCH_URL: &str = "https://api.ebay.com/buy/browse/v1/item_summary/search";

const OAUTH_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// Items requested per search call; a shorter page ends pagination
pub const PAGE_SIZE: usize = 200;

/// Safety bound for a backend that ignores `offset`
pub const MAX_PAGES: u32 = 50;

const SEARCH_QUERY: &str = "(Mitsubishi Eclipse 2g, D32A)";
const CATEGORY_IDS: &str = "6030";

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens are refreshed this long before eBay says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowseResponse {
    #[serde(default)]
    total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    item_summaries: Vec<EbayItem>,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    offset: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayItem {
    #[serde(default, deserialize_with = "null_as_default")]
    item_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    price: EbayPrice,
    #[serde(default, deserialize_with = "null_as_default")]
    item_web_url: String,
    #[serde(default)]
    item_origin_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    thumbnail_images: Vec<EbayImage>,
}

#[derive(Debug, Default, Deserialize)]
struct EbayPrice {
    #[serde(default, deserialize_with = "null_as_default")]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EbayImage {
    #[serde(default, deserialize_with = "null_as_default")]
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    long_message: String,
}

/// Client for the eBay Browse API.
///
/// Authenticates with the client-credentials grant and pages through a fixed
/// search. The caller's `limit` is not applied here: every page is returned.
pub struct EbayClient {
    client: Client,
    site_id: i32,
    credentials: EbayCredentials,
    token_url: String,
    search_url: String,
    /// Owned by this instance; the lock serializes concurrent refreshes
    token: Mutex<Option<CachedToken>>,
}

impl EbayClient {
    pub fn new(site_id: i32, credentials: EbayCredentials) -> Result<Self> {
        Ok(Self::with_client(site_id, credentials, build_client(&HttpConfig::default())?))
    }

    /// Create a client on a shared HTTP client. Endpoints follow the
    /// credentials' sandbox flag.
    pub fn with_client(site_id: i32, credentials: EbayCredentials, client: Client) -> Self {
        let (token_url, search_url) = if credentials.sandbox {
            (SANDBOX_TOKEN_URL, SANDBOX_SEARCH_URL)
        } else {
            (PROD_TOKEN_URL, PROD_SEARCH_URL)
        };
        Self {
            client,
            site_id,
            credentials,
            token_url: token_url.to_string(),
            search_url: search_url.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Override both endpoints (used against mock servers)
    pub fn with_endpoints(mut self, token_url: &str, search_url: &str) -> Result<Self> {
        parse_base_url(token_url)?;
        parse_base_url(search_url)?;
        self.token_url = token_url.to_string();
        self.search_url = search_url.to_string();
        Ok(self)
    }

    /// Return a cached bearer token, exchanging credentials when it is
    /// missing or about to expire.
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let fresh = self.request_token(cancel).await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self, cancel: &CancellationToken) -> Result<CachedToken> {
        debug!("[eBay] Requesting access token from {}", self.token_url);

        let request = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", OAUTH_SCOPE)])
            .timeout(TOKEN_TIMEOUT);

        let response = http::send(cancel, &self.token_url, request)
            .await
            .map_err(into_auth_error)?;
        let status = response.status();
        let body = http::read_text(cancel, &self.token_url, response)
            .await
            .map_err(into_auth_error)?;

        if status != StatusCode::OK {
            return Err(ScrapeError::Auth(format!("status {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ScrapeError::Auth(format!("failed to parse token response: {e}")))?;
        if token.access_token.is_empty() {
            return Err(ScrapeError::Auth("token response carried no access_token".into()));
        }

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!("[eBay] Access token retrieved, valid for {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    fn page_url(&self, offset: usize) -> Result<String> {
        let mut url = parse_base_url(&self.search_url)?;
        url.query_pairs_mut()
            .append_pair("sort", "newlyListed")
            .append_pair("limit", &PAGE_SIZE.to_string())
            .append_pair("offset", &offset.to_string())
            .append_pair("q", SEARCH_QUERY)
            .append_pair("category_ids", CATEGORY_IDS);
        Ok(url.to_string())
    }

    async fn fetch_page(&self, cancel: &CancellationToken, token: &str, offset: usize) -> Result<BrowseResponse> {
        let url = self.page_url(offset)?;
        debug!("[eBay] Fetching {}", url);

        let request = self.client.get(&url).header(AUTHORIZATION, format!("Bearer {token}"));
        let response = http::send(cancel, &url, request).await?;
        let status = response.status();
        let body = http::read_text(cancel, &url, response).await?;

        if status != StatusCode::OK {
            return Err(ScrapeError::Status {
                url,
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        http::decode_json(&url, &body)
    }

    async fn to_part(&self, cancel: &CancellationToken, item: EbayItem, image_base: &Url) -> Result<Part> {
        let mut part = Part::for_site(self.site_id);
        part.description = item.title.clone();
        part.name = item.title;
        part.url = item.item_web_url;
        part.price = format!("€ {}", item.price.value);
        part.creation_date = item.item_origin_date;

        if let Some(thumb) = item.thumbnail_images.first().filter(|t| !t.image_url.is_empty()) {
            part.image_base64 =
                inline_image(&self.client, cancel, &thumb.image_url, image_base, self.name(), &item.item_id).await?;
        }

        part.id = item.item_id;
        Ok(part)
    }
}

/// Transport failures during the token exchange are auth failures, except
/// for cancellation which stays distinguishable.
fn into_auth_error(e: ScrapeError) -> ScrapeError {
    match e {
        ScrapeError::Cancelled => ScrapeError::Cancelled,
        other => ScrapeError::Auth(other.to_string()),
    }
}

/// Message for a non-200 search response: the first entry of eBay's error
/// envelope when it decodes, otherwise the raw body.
fn error_detail(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => {
            let first = &envelope.errors[0];
            if first.long_message.is_empty() {
                format!(": {}", first.message)
            } else {
                format!(": {} ({})", first.message, first.long_message)
            }
        }
        _ => format!(": {body}"),
    }
}

#[async_trait]
impl SiteClient for EbayClient {
    fn name(&self) -> &'static str {
        "eBay"
    }

    fn site_id(&self) -> i32 {
        self.site_id
    }

    async fn fetch_parts(&self, cancel: &CancellationToken, params: &SearchParams) -> Result<Vec<Part>> {
        info!("[eBay] Starting fetch with params: {:?}", params);

        let token = self.access_token(cancel).await?;
        let image_base = parse_base_url(&self.search_url)?;

        let mut all_parts = Vec::new();
        let mut offset = 0;
        let mut page = 1;

        loop {
            let response = match self.fetch_page(cancel, &token, offset).await {
                Ok(response) => response,
                Err(e) => {
                    if matches!(e, ScrapeError::Status { status: 401, .. }) {
                        // Drop the rejected token so the next call exchanges again
                        *self.token.lock().await = None;
                    }
                    return Err(e.on_page(page));
                }
            };
            debug!(
                "[eBay] Page {}: {} items (total {}, limit {}, offset {})",
                page,
                response.item_summaries.len(),
                response.total,
                response.limit,
                response.offset
            );

            let page_len = response.item_summaries.len();
            for item in response.item_summaries {
                let part = self.to_part(cancel, item, &image_base).await.map_err(|e| e.on_page(page))?;
                all_parts.push(part);
            }

            if page_len < PAGE_SIZE {
                break;
            }
            if page == MAX_PAGES {
                warn!("[eBay] Hit the {} page ceiling, stopping", MAX_PAGES);
                break;
            }
            offset += PAGE_SIZE;
            page += 1;
        }

        info!("[eBay] Finished fetching. Total parts: {} from {} page(s)", all_parts.len(), page);
        Ok(all_parts)
    }
}
