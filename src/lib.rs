//! Used car parts aggregation across classifieds, a form-search API and the
//! eBay Browse API, normalized into one [`Part`] record.

pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;

pub use error::{Result, ScrapeError};
pub use models::Part;
pub use scrapers::{SearchParams, SiteClient};
