//! User-authored stories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::Keyed;
use crate::utils::new_entity_id;

use super::decode;

/// Generation state of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    /// The backend is still producing text or assets.
    Generating,
    /// Complete and readable.
    Ready,
    /// Generation gave up; the story holds whatever partial text exists.
    Failed,
    /// A status value this client version does not know.
    Unknown,
}

impl StoryStatus {
    /// Map wire values from every backend generation. Unrecognized values
    /// decode as [`StoryStatus::Unknown`] rather than failing the story.
    fn from_wire(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "generating" | "pending" | "in_progress" => Self::Generating,
            "ready" | "complete" | "done" => Self::Ready,
            "failed" | "error" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for StoryStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A story the user wrote or generated.
///
/// Decoded by hand: story payloads have drifted across three backend
/// generations. Accepted field names, in priority order:
///
/// | field           | accepted names                           |
/// |-----------------|------------------------------------------|
/// | `id`            | `id`, `storyId`, `story_id`              |
/// | `title`         | `title`, `storyTitle`, `name`            |
/// | `text`          | `text`, `storyText`, `content`, `body`   |
/// | `character_ids` | `characterIds`, `heroIds`, `characters`  |
/// | `template_id`   | `templateId`, `template_id`              |
/// | `cover_url`     | `coverUrl`, `coverImageUrl`, `imageUrl`  |
/// | `audio_url`     | `audioUrl`, `narrationUrl`               |
/// | `status`        | `status`, `generationStatus`, `state`    |
/// | `created_at`    | `createdAt`, `created_at`, `created`     |
///
/// Numeric ids and epoch timestamps from the v1 backend are accepted by
/// the extractors in [`crate::models::decode`]. Payloads without a status
/// predate async generation and decode as [`StoryStatus::Ready`]. Only a
/// missing `id` fails the decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub text: String,
    pub character_ids: Vec<String>,
    pub template_id: Option<String>,
    pub cover_url: Option<String>,
    pub audio_url: Option<String>,
    pub status: StoryStatus,
    pub created_at: DateTime<Utc>,
}

impl Story {
    /// A locally authored story with a freshly minted id.
    pub fn draft(title: impl Into<String>, text: impl Into<String>, character_ids: Vec<String>) -> Self {
        Self {
            id: new_entity_id(),
            title: title.into(),
            text: text.into(),
            character_ids,
            template_id: None,
            cover_url: None,
            audio_url: None,
            status: StoryStatus::Ready,
            created_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == StoryStatus::Ready
    }
}

impl Keyed for Story {
    fn key(&self) -> &str {
        &self.id
    }
}

impl<'de> Deserialize<'de> for Story {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let obj = decode::object(deserializer)?;
        let id = decode::string_at(&obj, &["id", "storyId", "story_id"])
            .ok_or_else(|| serde::de::Error::missing_field("id"))?;
        Ok(Story {
            id,
            title: decode::string_at(&obj, &["title", "storyTitle", "name"])
                .unwrap_or_else(|| "Untitled story".to_string()),
            text: decode::string_at(&obj, &["text", "storyText", "content", "body"])
                .unwrap_or_default(),
            character_ids: decode::strings_at(&obj, &["characterIds", "heroIds", "characters"]),
            template_id: decode::string_at(&obj, &["templateId", "template_id"]),
            cover_url: decode::string_at(&obj, &["coverUrl", "coverImageUrl", "imageUrl"]),
            audio_url: decode::string_at(&obj, &["audioUrl", "narrationUrl"]),
            status: decode::string_at(&obj, &["status", "generationStatus", "state"])
                .map(|raw| StoryStatus::from_wire(&raw))
                .unwrap_or(StoryStatus::Ready),
            created_at: decode::datetime_at(&obj, &["createdAt", "created_at", "created"])
                .unwrap_or_else(Utc::now),
        })
    }
}
