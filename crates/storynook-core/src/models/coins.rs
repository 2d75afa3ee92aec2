//! The coin economy: balance and transaction history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::Keyed;

use super::decode;

/// Why coins moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    StoryGeneration,
    AudioNarration,
    IllustrationPack,
    Grant,
    Refund,
    SubscriptionBonus,
    /// A kind this client version does not know.
    Unknown,
}

impl TransactionKind {
    /// Map wire values from every backend generation. Unrecognized kinds
    /// decode as [`TransactionKind::Unknown`] rather than failing the row.
    fn from_wire(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "purchase" | "coin_purchase" | "topup" => Self::Purchase,
            "story_generation" | "story_spend" | "story" => Self::StoryGeneration,
            "audio_narration" | "audio_spend" | "audio" => Self::AudioNarration,
            "illustration_pack" | "illustrations" | "image_spend" => Self::IllustrationPack,
            "grant" | "welcome_grant" | "gift" => Self::Grant,
            "refund" => Self::Refund,
            "subscription_bonus" | "sub_bonus" | "subscription" => Self::SubscriptionBonus,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchase => "coin purchase",
            Self::StoryGeneration => "story generation",
            Self::AudioNarration => "audio narration",
            Self::IllustrationPack => "illustration pack",
            Self::Grant => "grant",
            Self::Refund => "refund",
            Self::SubscriptionBonus => "subscription bonus",
            Self::Unknown => "other",
        }
    }
}

impl<'de> Deserialize<'de> for TransactionKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// One movement on the user's coin balance.
///
/// Decoded by hand: the ledger is the oldest endpoint in the backend and
/// has shipped three field namings. Accepted names, in priority order:
///
/// | field        | accepted names                           |
/// |--------------|------------------------------------------|
/// | `id`         | `id`, `transactionId`, `txId`            |
/// | `amount`     | `amount`, `coinAmount`, `coins`, `delta` |
/// | `kind`       | `kind`, `type`, `reason`                 |
/// | `note`       | `note`, `description`, `memo`            |
/// | `created_at` | `createdAt`, `timestamp`, `ts`           |
///
/// Positive amounts credit the balance, negative amounts spend from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinTransaction {
    pub id: String,
    pub amount: i64,
    pub kind: TransactionKind,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CoinTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount >= 0
    }
}

impl Keyed for CoinTransaction {
    fn key(&self) -> &str {
        &self.id
    }
}

impl<'de> Deserialize<'de> for CoinTransaction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let obj = decode::object(deserializer)?;
        let id = decode::string_at(&obj, &["id", "transactionId", "txId"])
            .ok_or_else(|| serde::de::Error::missing_field("id"))?;
        Ok(CoinTransaction {
            id,
            amount: decode::i64_at(&obj, &["amount", "coinAmount", "coins", "delta"])
                .unwrap_or(0),
            kind: decode::string_at(&obj, &["kind", "type", "reason"])
                .map(|raw| TransactionKind::from_wire(&raw))
                .unwrap_or(TransactionKind::Unknown),
            note: decode::string_at(&obj, &["note", "description", "memo"]),
            created_at: decode::datetime_at(&obj, &["createdAt", "timestamp", "ts"])
                .unwrap_or_else(Utc::now),
        })
    }
}

/// The user's current coin balance. A single value, not a collection, so
/// it is fetched directly rather than through a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    #[serde(alias = "balance", alias = "coins")]
    pub available: i64,
    #[serde(default)]
    pub lifetime_earned: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
