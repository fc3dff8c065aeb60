//! Transport and process configuration.
//!
//! [`HttpConfig`] is what the site clients consume. [`AppConfig`] is only
//! used by the binary and is read from the environment (and `.env`).

use crate::error::ScrapeError;
use std::path::PathBuf;

/// Settings for the HTTP client shared by every site client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Skip TLS certificate verification. Some of the sources serve broken
    /// chains, so this defaults to `true`.
    pub accept_invalid_certs: bool,
    /// Overrides the client-wide User-Agent. Per-request browser headers
    /// set by the scrapers still win.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            accept_invalid_certs: true,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.timeout_secs == 0 {
            return Err(ScrapeError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// eBay application credentials, supplied by the operator.
#[derive(Debug, Clone)]
pub struct EbayCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub sandbox: bool,
}

/// Everything the `parts-finder` binary needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub kleinanzeigen_site_id: i32,
    pub schadeautos_site_id: i32,
    pub ebay_site_id: i32,
    /// eBay is skipped when no credentials are configured
    pub ebay: Option<EbayCredentials>,
    pub year_from: u32,
    pub year_to: u32,
    pub limit: u32,
    pub output: PathBuf,
}

impl AppConfig {
    /// Load from the process environment after applying `.env` if present.
    pub fn from_env() -> Result<Self, ScrapeError> {
        // A missing .env is fine, the variables may come from the shell
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScrapeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ebay = match (get("EBAY_CLIENT_ID"), get("EBAY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(EbayCredentials {
                client_id,
                client_secret,
                sandbox: parse_bool("EBAY_SANDBOX", get("EBAY_SANDBOX"), false)?,
            }),
            _ => None,
        };

        let http = HttpConfig {
            accept_invalid_certs: parse_bool("HTTP_INSECURE", get("HTTP_INSECURE"), true)?,
            ..HttpConfig::default()
        };
        http.validate()?;

        Ok(Self {
            http,
            kleinanzeigen_site_id: parse_num("KLEINANZEIGEN_SITE_ID", get("KLEINANZEIGEN_SITE_ID"), 1)?,
            schadeautos_site_id: parse_num("SCHADEAUTOS_SITE_ID", get("SCHADEAUTOS_SITE_ID"), 2)?,
            ebay_site_id: parse_num("EBAY_SITE_ID", get("EBAY_SITE_ID"), 3)?,
            ebay,
            year_from: parse_num("PARTS_YEAR_FROM", get("PARTS_YEAR_FROM"), 0)?,
            year_to: parse_num("PARTS_YEAR_TO", get("PARTS_YEAR_TO"), 0)?,
            limit: parse_num("PARTS_LIMIT", get("PARTS_LIMIT"), 0)?,
            output: get("PARTS_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("scraped_parts.json")),
        })
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ScrapeError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ScrapeError::Config(format!("{key} must be a number, got {v:?}"))),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, ScrapeError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ScrapeError::Config(format!("{key} must be a boolean, got {v:?}"))),
        },
    }
}
