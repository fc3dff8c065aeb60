use anyhow::Context;
use parts_finder::config::AppConfig;
use parts_finder::scrapers::http::build_client;
use parts_finder::scrapers::{EbayClient, KleinanzeigenScraper, SchadeAutosClient, SearchParams, SiteClient};
use parts_finder::Part;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Parts Finder - used car parts aggregator");

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let client = build_client(&config.http).context("Failed to create HTTP client")?;

    let mut sources: Vec<Box<dyn SiteClient>> = vec![
        Box::new(KleinanzeigenScraper::with_client(config.kleinanzeigen_site_id, client.clone())?),
        Box::new(SchadeAutosClient::with_client(config.schadeautos_site_id, client.clone())?),
    ];
    match config.ebay.clone() {
        Some(credentials) => {
            sources.push(Box::new(EbayClient::with_client(config.ebay_site_id, credentials, client.clone())));
        }
        None => warn!("EBAY_CLIENT_ID/EBAY_CLIENT_SECRET not set, skipping eBay"),
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling in-flight fetches");
                cancel.cancel();
            }
        });
    }

    let params = SearchParams {
        year_from: config.year_from,
        year_to: config.year_to,
        limit: config.limit,
        ..Default::default()
    };

    let mut all_parts: Vec<Part> = Vec::new();
    for source in &sources {
        info!("Fetching from {} (site {})", source.name(), source.site_id());
        match source.fetch_parts(&cancel, &params).await {
            Ok(parts) => {
                info!("{}: {} parts", source.name(), parts.len());
                all_parts.extend(parts);
            }
            Err(e) if e.is_cancelled() => {
                warn!("{}: cancelled", source.name());
                break;
            }
            Err(e) => error!("{}: query failed: {}", source.name(), e),
        }
    }

    for (i, part) in all_parts.iter().enumerate() {
        println!("{}. [{}] {} ({})", i + 1, part.site_id, part.name, part.price);
        println!("   URL: {}", part.url);
    }

    let json = serde_json::to_string_pretty(&all_parts)?;
    tokio::fs::write(&config.output, json)
        .await
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    info!("Saved {} parts to {}", all_parts.len(), config.output.display());

    Ok(())
}
