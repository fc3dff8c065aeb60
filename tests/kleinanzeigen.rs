//! End-to-end tests for the Kleinanzeigen scraper against a wiremock server.
//!
//! Covers the pagination termination rules (empty page, short page, limit),
//! image inlining and cancellation mid-pagination.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{Datelike, Timelike};
use parts_finder::scrapers::kleinanzeigen::ITEMS_PER_PAGE;
use parts_finder::scrapers::{KleinanzeigenScraper, SearchParams, SiteClient};
use parts_finder::ScrapeError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE_ID: i32 = 11;

fn ad(id: usize, image: Option<&str>) -> String {
    let image = image
        .map(|src| format!(r#"<div class="imagebox"><img src="{src}" /></div>"#))
        .unwrap_or_default();
    format!(
        r#"<article class="aditem" data-adid="{id}" data-href="/s-anzeige/teil-{id}/{id}-223-1">
  {image}
  <div class="aditem-main--top--right">Gestern, 10:15</div>
  <h2><a class="ellipsis">Eclipse Teil {id}</a></h2>
  <p class="aditem-main--middle--description">Teil Nummer {id}</p>
  <p class="aditem-main--middle--price-shipping--price">{id} €</p>
</article>"#
    )
}

fn page_html(ads: &[String]) -> String {
    format!("<html><body><ul>{}</ul></body></html>", ads.join("\n"))
}

fn page_of(start: usize, count: usize) -> String {
    let ads: Vec<String> = (start..start + count).map(|id| ad(id, None)).collect();
    page_html(&ads)
}

async fn mount_page(server: &MockServer, page: u32, body: String, expected: u64) {
    let mock = Mock::given(method("GET")).and(path("/s-suchanfrage.html"));
    let mock = if page == 1 {
        mock.and(query_param_is_missing("pageNum"))
    } else {
        mock.and(query_param("pageNum", page.to_string()))
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

fn scraper(server: &MockServer) -> KleinanzeigenScraper {
    KleinanzeigenScraper::new(SITE_ID)
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
}

#[tokio::test]
async fn stops_after_short_page() {
    let server = MockServer::start().await;
    let p = ITEMS_PER_PAGE;
    mount_page(&server, 1, page_of(0, p), 1).await;
    mount_page(&server, 2, page_of(p, p), 1).await;
    mount_page(&server, 3, page_of(2 * p, p), 1).await;
    mount_page(&server, 4, page_of(3 * p, 7), 1).await;
    mount_page(&server, 5, page_of(1000, p), 0).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap();

    assert_eq!(parts.len(), 3 * p + 7);
    // Order follows the pages
    assert_eq!(parts[0].id, "0");
    assert_eq!(parts[3 * p + 6].id, (3 * p + 6).to_string());
    assert!(parts.iter().all(|part| part.site_id == SITE_ID));
}

#[tokio::test]
async fn empty_first_page_is_an_empty_success() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_html(&[]), 1).await;
    mount_page(&server, 2, page_of(0, ITEMS_PER_PAGE), 0).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap();

    assert!(parts.is_empty());
}

#[tokio::test]
async fn truncates_to_limit() {
    let server = MockServer::start().await;
    let p = ITEMS_PER_PAGE;
    mount_page(&server, 1, page_of(0, p), 1).await;
    mount_page(&server, 2, page_of(p, p), 1).await;
    mount_page(&server, 3, page_of(2 * p, p), 0).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::with_limit(30))
        .await
        .unwrap();

    assert_eq!(parts.len(), 30);
    assert_eq!(parts.last().unwrap().id, "29");
}

#[tokio::test]
async fn limit_applies_on_a_short_last_page() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(0, 12), 1).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::with_limit(5))
        .await
        .unwrap();

    assert_eq!(parts.len(), 5);
}

#[tokio::test]
async fn limit_is_applied_before_images_are_downloaded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .expect(5)
        .mount(&server)
        .await;

    let src = format!("{}/img/photo.jpg", server.uri());
    let ads: Vec<String> = (0..ITEMS_PER_PAGE).map(|id| ad(id, Some(src.as_str()))).collect();
    mount_page(&server, 1, page_html(&ads), 1).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::with_limit(5))
        .await
        .unwrap();

    assert_eq!(parts.len(), 5);
    assert!(parts.iter().all(|part| part.image_base64.is_some()));
}

#[tokio::test]
async fn absolute_listing_date_keeps_its_calendar_day() {
    let server = MockServer::start().await;
    let body = page_html(&[r#"<article class="aditem" data-adid="77" data-href="/s-anzeige/tacho/77-223-1">
  <div class="aditem-main--top--right">01.02.2023</div>
  <h2><a class="ellipsis">Tacho</a></h2>
</article>"#
        .to_string()]);
    mount_page(&server, 1, body, 1).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap();

    let date = parts[0].creation_date.unwrap();
    assert_eq!((date.year(), date.month(), date.day()), (2023, 2, 1));
    assert_eq!((date.hour(), date.minute()), (0, 0));
    assert_eq!(
        serde_json::to_value(&parts[0]).unwrap()["creation_date"],
        "2023-02-01T00:00:00Z"
    );
}

#[tokio::test]
async fn parts_carry_absolute_urls_and_fields() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(42, 1), 1).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap();

    let part = &parts[0];
    assert_eq!(part.url, format!("{}/s-anzeige/teil-42/42-223-1", server.uri()));
    assert_eq!(part.name, "Eclipse Teil 42");
    assert_eq!(part.description, "Teil Nummer 42");
    assert_eq!(part.price, "42 €");
    assert!(part.creation_date.is_some());
    assert!(part.image_base64.is_none());
}

#[tokio::test]
async fn inlines_images_and_tolerates_broken_ones() {
    let server = MockServer::start().await;
    let image_bytes = b"\x89PNG fake image".to_vec();

    Mock::given(method("GET"))
        .and(path("/img/ok.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(image_bytes.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let ok_src = format!("{}/img/ok.jpg", server.uri());
    let missing_src = format!("{}/img/missing.jpg", server.uri());
    let body = page_html(&[ad(1, Some(ok_src.as_str())), ad(2, Some(missing_src.as_str()))]);
    mount_page(&server, 1, body, 1).await;

    let parts = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].image_base64.as_deref(), Some(BASE64_STANDARD.encode(&image_bytes).as_str()));
    assert!(parts[1].image_base64.is_none());
}

#[tokio::test]
async fn server_error_fails_the_whole_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(0, ITEMS_PER_PAGE), 1).await;
    Mock::given(method("GET"))
        .and(path("/s-suchanfrage.html"))
        .and(query_param("pageNum", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = scraper(&server)
        .fetch_parts(&CancellationToken::new(), &SearchParams::default())
        .await
        .unwrap_err();

    match err {
        ScrapeError::Page { page, source } => {
            assert_eq!(page, 2);
            assert!(matches!(*source, ScrapeError::Status { status: 503, .. }));
        }
        other => panic!("expected page error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_mid_pagination_returns_promptly() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(0, ITEMS_PER_PAGE), 1).await;
    Mock::given(method("GET"))
        .and(path("/s-suchanfrage.html"))
        .and(query_param("pageNum", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page_of(100, ITEMS_PER_PAGE))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let result = scraper(&server)
        .fetch_parts(&cancel, &SearchParams::default())
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    let err = result.unwrap_err();
    assert!(err.is_cancelled(), "expected cancellation, got {err:?}");
}
