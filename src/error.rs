//! Error types shared by every site client.
//!
//! Only fatal, call-level failures are represented here. Item-level problems
//! (a malformed listing, a missing image) are logged and never returned.

/// Errors that abort a whole `fetch_parts` call.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The shared HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than 200 OK.
    #[error("unexpected status code {status} from {url}{detail}")]
    Status {
        url: String,
        status: u16,
        /// Already formatted as `": message"` or empty.
        detail: String,
    },

    /// The top-level payload was not the JSON document we expected.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The OAuth client-credentials exchange failed.
    #[error("token request failed: {0}")]
    Auth(String),

    /// A form-search item carried an enter date we could not parse.
    #[error("item {item} has unparsable enter date {raw:?}")]
    InvalidDate { item: String, raw: String },

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid CSS selector: {0}")]
    Selector(String),

    /// The caller's cancellation token fired while a request was in flight.
    #[error("fetch cancelled")]
    Cancelled,

    /// A failure while fetching one page of a paginated source.
    #[error("failed to fetch page {page}: {source}")]
    Page {
        page: u32,
        #[source]
        source: Box<ScrapeError>,
    },
}

impl ScrapeError {
    /// Wrap this error with the page number it happened on.
    pub fn on_page(self, page: u32) -> Self {
        ScrapeError::Page {
            page,
            source: Box::new(self),
        }
    }

    /// True when the error (or the page error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ScrapeError::Cancelled => true,
            ScrapeError::Page { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
