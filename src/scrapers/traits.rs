use crate::error::Result;
use crate::models::Part;
use crate::scrapers::types::SearchParams;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Common contract for every parts source.
///
/// Implementations drive their own pagination and return the complete,
/// order-preserving list. An `Err` means the query failed; an empty `Ok`
/// means the source had no matching listings.
#[async_trait]
pub trait SiteClient: Send + Sync {
    /// Human-readable source label
    fn name(&self) -> &'static str;

    /// Configured numeric identity, echoed into every `Part::site_id`
    fn site_id(&self) -> i32;

    /// Fetch every part matching `params`, aborting when `cancel` fires
    async fn fetch_parts(
        &self,
        cancel: &CancellationToken,
        params: &SearchParams,
    ) -> Result<Vec<Part>>;
}
