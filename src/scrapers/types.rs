use serde::{Deserialize, Serialize};

/// Search parameters for a parts query.
///
/// Sources interpret these loosely: some ignore the vehicle identity and
/// search a fixed target. Zero means "unset" for every numeric field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub vehicle_type: String,
    pub make: String,
    pub base_model: String,
    pub model: String,
    pub year_from: u32,
    pub year_to: u32,
    pub offset: u32,
    /// Upper bound on returned records, not a page-size hint
    pub limit: u32,
}

impl SearchParams {
    /// Params with only a result limit set
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}
