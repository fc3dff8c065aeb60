pub mod dates;
pub mod ebay;
pub mod http;
pub mod image;
pub mod kleinanzeigen;
pub mod schadeautos;
pub mod traits;
pub mod types;

pub use ebay::EbayClient;
pub use kleinanzeigen::KleinanzeigenScraper;
pub use schadeautos::SchadeAutosClient;
pub use traits::SiteClient;
pub use types::SearchParams;
