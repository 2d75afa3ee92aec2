//! Favorited stories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Keyed;

use super::story::Story;

/// A story the user marked as a favorite.
///
/// Denormalizes the story title so the favorites screen renders without
/// joining the stories collection. Keyed by the story id: favoriting is a
/// set membership, not a separate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStory {
    #[serde(alias = "id")]
    pub story_id: String,
    #[serde(default, alias = "storyTitle")]
    pub title: String,
    #[serde(default = "Utc::now")]
    pub favorited_at: DateTime<Utc>,
}

impl FavoriteStory {
    pub fn new(story: &Story) -> Self {
        Self {
            story_id: story.id.clone(),
            title: story.title.clone(),
            favorited_at: Utc::now(),
        }
    }

    /// For unfavoriting a story that is no longer in the stories cache.
    pub fn by_id(story_id: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            title: String::new(),
            favorited_at: Utc::now(),
        }
    }
}

impl Keyed for FavoriteStory {
    fn key(&self) -> &str {
        &self.story_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_legacy_id_alias() {
        let favorite: FavoriteStory = serde_json::from_value(json!({
            "id": "st-1",
            "storyTitle": "The Brave Snail"
        }))
        .unwrap();
        assert_eq!(favorite.story_id, "st-1");
        assert_eq!(favorite.title, "The Brave Snail");
    }

    #[test]
    fn test_keyed_by_story_id() {
        let favorite = FavoriteStory::by_id("st-9");
        assert_eq!(favorite.key(), "st-9");
    }
}
