use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized car part listing, produced once per source item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    /// Source-native identifier, unique only within its source
    pub id: String,
    pub description: String,
    /// Reserved, no source fills it yet
    pub type_name: String,
    pub name: String,
    /// Inlined thumbnail, `None` when there was no image or it could not be fetched
    pub image_base64: Option<String>,
    pub url: String,
    pub site_id: i32,
    /// Currency-prefixed, formatted the way the source formats it
    pub price: String,
    /// `None` when the source date could not be parsed
    pub creation_date: Option<DateTime<Utc>>,
}

impl Part {
    /// Empty record stamped with the producing site's id
    pub fn for_site(site_id: i32) -> Self {
        Self {
            id: String::new(),
            description: String::new(),
            type_name: String::new(),
            name: String::new(),
            image_base64: None,
            url: String::new(),
            site_id,
            price: String::new(),
            creation_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_keys() {
        let mut part = Part::for_site(7);
        part.id = "abc".into();
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["site_id"], 7);
        assert_eq!(value["id"], "abc");
        assert!(value["image_base64"].is_null());
        assert!(value["creation_date"].is_null());
        assert_eq!(value["type_name"], "");
    }
}
