use crate::config::HttpConfig;
use crate::error::{Result, ScrapeError};
use crate::models::Part;
use crate::scrapers::dates::parse_enter_date;
use crate::scrapers::http::{self, build_client, null_as_default, parse_base_url, BROWSER_USER_AGENT};
use crate::scrapers::image::inline_image;
use crate::scrapers::traits::SiteClient;
use crate::scrapers::types::SearchParams;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

pub const SCHADEAUTOS_BASE_URL: &str = "https://www.schadeautos.nl";

pub const DEFAULT_YEAR_FROM: u32 = 1995;
pub const DEFAULT_YEAR_TO: u32 = 2000;

/// Large enough to return the whole stock in one call
pub const DEFAULT_LIMIT: u32 = 3000;

const VEHICLE_TYPE: &str = "P";
const MAKE_CODE: &str = "A0001E2D";
const BASE_MODEL_CODE: &str = "A0001FHK";
const MODEL_CODE: &str = "A0001FHL";

/// Client for the schadeautos.nl parts search.
///
/// One form POST returns every matching part; the backend pages natively
/// so there is no pagination loop here.
pub struct SchadeAutosClient {
    client: Client,
    base_url: Url,
    site_id: i32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    limited: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    descr: String,
    #[serde(rename = "stockParts", default, deserialize_with = "stock_parts")]
    stock_parts: HashMap<String, StockPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockPart {
    #[serde(default, deserialize_with = "null_as_default")]
    descr: String,
    #[serde(default, deserialize_with = "null_as_default")]
    enter_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    picture: String,
    #[serde(default, deserialize_with = "null_as_default")]
    price: String,
}

/// Decode `stockParts` one entry at a time so a bad item is named in the
/// error. The backend encodes an empty result set as `[]` instead of `{}`.
fn stock_parts<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, StockPart>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(HashMap::new()),
        Value::Array(items) if items.is_empty() => Ok(HashMap::new()),
        Value::Object(entries) => entries
            .into_iter()
            .map(|(id, raw)| match serde_json::from_value::<StockPart>(raw) {
                Ok(part) => Ok((id, part)),
                Err(e) => Err(D::Error::custom(format!("stock part {id}: {e}"))),
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "stockParts: expected an object of parts, got {other}"
        ))),
    }
}

impl SchadeAutosClient {
    /// Create a client with its own default HTTP client
    pub fn new(site_id: i32) -> Result<Self> {
        Self::with_client(site_id, build_client(&HttpConfig::default())?)
    }

    pub fn with_client(site_id: i32, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(SCHADEAUTOS_BASE_URL)?,
            site_id,
        })
    }

    /// Point the client at another host (used against mock servers)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|source| ScrapeError::Url {
            url: path.to_string(),
            source,
        })
    }

    fn part_url(&self, part_id: &str) -> String {
        format!(
            "{}/parts/eng/part/{}",
            self.base_url.as_str().trim_end_matches('/'),
            part_id
        )
    }

    fn origin(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

/// Form fields for one search. Unset years and limit fall back to defaults.
pub fn search_form(params: &SearchParams) -> Vec<(&'static str, String)> {
    let year_from = if params.year_from == 0 { DEFAULT_YEAR_FROM } else { params.year_from };
    let year_to = if params.year_to == 0 { DEFAULT_YEAR_TO } else { params.year_to };
    let limit = if params.limit == 0 { DEFAULT_LIMIT } else { params.limit };

    vec![
        ("widget[vehicleType]", VEHICLE_TYPE.to_string()),
        ("widget[make]", MAKE_CODE.to_string()),
        ("widget[baseModel]", BASE_MODEL_CODE.to_string()),
        ("widget[model]", MODEL_CODE.to_string()),
        ("widget[type]", String::new()),
        ("widget[vehicle]", String::new()),
        ("widget[yearFrom]", year_from.to_string()),
        ("widget[yearTo]", year_to.to_string()),
        ("widget[category]", String::new()),
        ("widget[part]", String::new()),
        ("widget[priceMax]", String::new()),
        ("widget[query]", String::new()),
        ("offset", params.offset.to_string()),
        ("limit", limit.to_string()),
        ("order", String::new()),
        ("shop", String::new()),
        ("screenWidth", "2560".to_string()),
        ("action", "search".to_string()),
    ]
}

#[async_trait]
impl SiteClient for SchadeAutosClient {
    fn name(&self) -> &'static str {
        "SchadeAutos"
    }

    fn site_id(&self) -> i32 {
        self.site_id
    }

    async fn fetch_parts(&self, cancel: &CancellationToken, params: &SearchParams) -> Result<Vec<Part>> {
        info!("[SchadeAutos] Starting fetch with params: {:?}", params);

        let url = self.endpoint("/parts/eng/search.json")?.to_string();
        let referer = self.endpoint("/parts/eng/car-parts")?.to_string();

        let request = self
            .client
            .post(&url)
            .form(&search_form(params))
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ORIGIN, self.origin())
            .header(REFERER, referer);

        let response = http::send(cancel, &url, request).await?;
        http::ensure_ok(&url, &response)?;
        let body = http::read_text(cancel, &url, response).await?;
        let response: SearchResponse = http::decode_json(&url, &body)?;

        let stock_parts = response.result.stock_parts;
        debug!(
            "[SchadeAutos] Response parsed. Limited: {}, Descr: {}, Parts count: {}",
            response.result.limited,
            response.result.descr,
            stock_parts.len()
        );

        // Map iteration order, not stable across calls
        let mut parts = Vec::with_capacity(stock_parts.len());
        for (part_id, stock) in stock_parts {
            let creation_date = parse_enter_date(&stock.enter_date).ok_or_else(|| ScrapeError::InvalidDate {
                item: part_id.clone(),
                raw: stock.enter_date.clone(),
            })?;

            let mut part = Part::for_site(self.site_id);
            part.url = self.part_url(&part_id);
            part.description = stock.descr;
            part.name = stock.name;
            part.price = format!("€ {}", stock.price);
            part.creation_date = Some(creation_date);

            if !stock.picture.is_empty() {
                part.image_base64 =
                    inline_image(&self.client, cancel, &stock.picture, &self.base_url, self.name(), &part_id).await?;
            }

            part.id = part_id;
            parts.push(part);
        }

        info!("[SchadeAutos] Finished fetching. Total parts: {}", parts.len());
        Ok(parts)
    }
}
