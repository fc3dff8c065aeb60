use crate::config::HttpConfig;
use crate::error::{Result, ScrapeError};
use crate::models::Part;
use crate::scrapers::dates::parse_listing_date;
use crate::scrapers::http::{self, build_client, parse_base_url};
use crate::scrapers::image::inline_image;
use crate::scrapers::traits::SiteClient;
use crate::scrapers::types::SearchParams;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const KLEINANZEIGEN_BASE_URL: &str = "https://www.kleinanzeigen.de";

/// Kleinanzeigen always renders this many ads on a full result page
pub const ITEMS_PER_PAGE: usize = 25;

/// Safety bound against runaway pagination
pub const MAX_PAGES: u32 = 100;

const SEARCH_KEYWORDS: &str = "Mitsubishi Eclipse D30";
const CATEGORY_AUTO_PARTS: &str = "223";

const PAGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";
const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Scraper for the kleinanzeigen.de classifieds search.
///
/// The search target is fixed; vehicle fields in [`SearchParams`] are
/// ignored, only `limit` is honored.
pub struct KleinanzeigenScraper {
    client: Client,
    base_url: Url,
    site_id: i32,
}

impl KleinanzeigenScraper {
    /// Create a scraper with its own default HTTP client
    pub fn new(site_id: i32) -> Result<Self> {
        Self::with_client(site_id, build_client(&HttpConfig::default())?)
    }

    /// Create a scraper on a shared client
    pub fn with_client(site_id: i32, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(KLEINANZEIGEN_BASE_URL)?,
            site_id,
        })
    }

    /// Point the scraper at another host (used against mock servers)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Search URL for a 1-based page number; `pageNum` is omitted on page 1
    pub fn search_url(&self, page: u32) -> Result<Url> {
        let mut url = self
            .base_url
            .join("/s-suchanfrage.html")
            .map_err(|source| ScrapeError::Url {
                url: self.base_url.to_string(),
                source,
            })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("categoryId", CATEGORY_AUTO_PARTS)
                .append_pair("keywords", SEARCH_KEYWORDS)
                .append_pair("locationStr", "Deutschland")
                .append_pair("radius", "0")
                .append_pair("sortingField", "")
                .append_pair("adType", "")
                .append_pair("posterType", "")
                .append_pair("maxPrice", "")
                .append_pair("minPrice", "")
                .append_pair("buyNowEnabled", "false")
                .append_pair("shippingCarrier", "")
                .append_pair("shipping", "");
            if page > 1 {
                query.append_pair("pageNum", &page.to_string());
            }
        }

        Ok(url)
    }

    /// Fetch one result page and extract its ads, images not yet inlined
    async fn fetch_page(&self, cancel: &CancellationToken, page: u32) -> Result<Vec<Listing>> {
        let url = self.search_url(page)?.to_string();
        debug!("[Kleinanzeigen] Page {} URL: {}", page, url);

        let request = self
            .client
            .get(&url)
            .header(USER_AGENT, PAGE_USER_AGENT)
            .header(ACCEPT, PAGE_ACCEPT);
        let response = http::send(cancel, &url, request).await?;
        http::ensure_ok(&url, &response)?;
        let html = http::read_text(cancel, &url, response).await?;
        debug!("[Kleinanzeigen] Downloaded {} bytes of HTML", html.len());

        let now = Local::now();
        parse_listing_page(&html, &self.base_url, self.site_id, now.with_timezone(now.offset()))
    }

    /// Turn extracted ads into parts, downloading each ad's image
    async fn inline_images(&self, cancel: &CancellationToken, listings: Vec<Listing>) -> Result<Vec<Part>> {
        let mut parts = Vec::with_capacity(listings.len());
        for Listing { mut part, image_src } in listings {
            if let Some(src) = image_src {
                part.image_base64 =
                    inline_image(&self.client, cancel, &src, &self.base_url, self.name(), &part.id).await?;
            }
            parts.push(part);
        }
        Ok(parts)
    }
}

#[async_trait]
impl SiteClient for KleinanzeigenScraper {
    fn name(&self) -> &'static str {
        "Kleinanzeigen"
    }

    fn site_id(&self) -> i32 {
        self.site_id
    }

    async fn fetch_parts(&self, cancel: &CancellationToken, params: &SearchParams) -> Result<Vec<Part>> {
        info!("[Kleinanzeigen] Starting fetch with params: {:?}", params);

        let limit = params.limit as usize;
        let mut all_parts = Vec::new();
        let mut pages = 0;

        for page in 1..=MAX_PAGES {
            pages = page;
            let mut listings = self.fetch_page(cancel, page).await.map_err(|e| e.on_page(page))?;
            let page_len = listings.len();
            info!("[Kleinanzeigen] Page {}: got {} parts", page, page_len);

            if listings.is_empty() {
                debug!("[Kleinanzeigen] No more parts on page {}, stopping", page);
                break;
            }

            // Drop ads past the limit before their images are downloaded
            if limit > 0 {
                listings.truncate(limit.saturating_sub(all_parts.len()));
            }
            let page_parts = self.inline_images(cancel, listings).await.map_err(|e| e.on_page(page))?;
            all_parts.extend(page_parts);

            if limit > 0 && all_parts.len() >= limit {
                debug!("[Kleinanzeigen] Reached limit of {} parts, stopping", limit);
                break;
            }

            if page_len < ITEMS_PER_PAGE {
                debug!("[Kleinanzeigen] Short page ({} < {}), this is the last page", page_len, ITEMS_PER_PAGE);
                break;
            }

            if page == MAX_PAGES {
                warn!("[Kleinanzeigen] Hit the {} page ceiling, stopping", MAX_PAGES);
            }
        }

        info!("[Kleinanzeigen] Finished fetching. Total parts: {} from {} page(s)", all_parts.len(), pages);
        Ok(all_parts)
    }
}

/// A part extracted from markup, before its image is inlined
#[derive(Debug)]
pub(crate) struct Listing {
    pub part: Part,
    pub image_src: Option<String>,
}

struct ListingSelectors {
    article: Selector,
    date: Selector,
    title: Selector,
    description: Selector,
    price: Selector,
    image: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            article: selector("article.aditem")?,
            date: selector(".aditem-main--top--right")?,
            title: selector("h2 a.ellipsis")?,
            description: selector("p.aditem-main--middle--description")?,
            price: selector("p.aditem-main--middle--price-shipping--price")?,
            image: selector(".imagebox img")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{css}: {e:?}")))
}

fn non_empty_attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn text_of(element: &ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Parse every `article.aditem` on a result page.
///
/// Ads missing their id, link or title are skipped with a warning; they never
/// fail the page.
pub(crate) fn parse_listing_page(
    html: &str,
    base_url: &Url,
    site_id: i32,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Listing>> {
    let selectors = ListingSelectors::new()?;
    let document = Html::parse_document(html);

    let mut listings = Vec::new();
    for (idx, article) in document.select(&selectors.article).enumerate() {
        match extract_listing(&article, &selectors, base_url, site_id, now) {
            Ok(listing) => listings.push(listing),
            Err(reason) => warn!("[Kleinanzeigen] Skipping ad {}: {}", idx, reason),
        }
    }

    debug!("[Kleinanzeigen] Extracted {} parts from page", listings.len());
    Ok(listings)
}

fn extract_listing(
    article: &ElementRef,
    selectors: &ListingSelectors,
    base_url: &Url,
    site_id: i32,
    now: DateTime<FixedOffset>,
) -> std::result::Result<Listing, String> {
    let mut part = Part::for_site(site_id);

    part.id = non_empty_attr(article, "data-adid")
        .ok_or("missing data-adid")?
        .to_string();

    let href = non_empty_attr(article, "data-href").ok_or("missing data-href")?;
    part.url = base_url
        .join(href)
        .map_err(|e| format!("bad data-href {href:?}: {e}"))?
        .to_string();

    part.name = text_of(article, &selectors.title);
    if part.name.is_empty() {
        return Err("missing title".to_string());
    }

    part.description = text_of(article, &selectors.description);
    part.price = text_of(article, &selectors.price);

    let date_text = text_of(article, &selectors.date);
    if date_text.is_empty() {
        warn!("[Kleinanzeigen] No date text found for ad {}", part.id);
    } else {
        part.creation_date = parse_listing_date(&date_text, now);
        if part.creation_date.is_none() {
            warn!("[Kleinanzeigen] Could not parse date text {:?} for ad {}", date_text, part.id);
        }
    }

    let image_src = article
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(String::from);

    Ok(Listing { part, image_src })
}
