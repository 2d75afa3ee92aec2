//! The ready-made story catalog.

use serde::{Deserialize, Serialize};

use crate::cache::Keyed;

/// A catalog entry for a ready-made story the user can personalize.
///
/// Editorial content, read-only on the client. `summary`, `category` and
/// `price` are pre-v3 field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, alias = "summary")]
    pub synopsis: Option<String>,
    #[serde(default, alias = "category")]
    pub theme: Option<String>,
    /// Coin price to generate a story from this template. Zero means the
    /// template is in the free tier.
    #[serde(default, alias = "price")]
    pub coin_cost: i64,
    #[serde(default)]
    pub min_age: Option<u8>,
    #[serde(default)]
    pub max_age: Option<u8>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default, alias = "isPremium")]
    pub premium: bool,
}

impl StoryTemplate {
    pub fn is_free(&self) -> bool {
        self.coin_cost == 0 && !self.premium
    }
}

impl Keyed for StoryTemplate {
    fn key(&self) -> &str {
        &self.id
    }
}
