//! Reusable story characters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Keyed;
use crate::utils::new_entity_id;

/// A saved character the user can cast in new stories.
///
/// This endpoint never changed scalar types, so serde aliases cover its
/// drift: `heroName` and `avatarUrl` are the pre-v3 field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    #[serde(alias = "heroName")]
    pub name: String,
    /// Free-text traits fed into generation prompts ("brave", "loves jokes").
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default, alias = "look")]
    pub appearance: Option<String>,
    #[serde(default, alias = "avatarUrl")]
    pub portrait_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Character {
    /// A locally created character with a freshly minted id.
    pub fn new(name: impl Into<String>, traits: Vec<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            traits,
            appearance: None,
            portrait_url: None,
            created_at: Utc::now(),
        }
    }
}

impl Keyed for Character {
    fn key(&self) -> &str {
        &self.id
    }
}
