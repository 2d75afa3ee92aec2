//! Content screening for user-submitted story text.
//!
//! Rejection is an expected outcome, not an error: callers get
//! `Ok(Screening::Rejected(..))` with guidance the UI can show as-is, and
//! `Err(ApiError)` only for transport-class failures. Obvious problems
//! (empty or oversized text) are rejected locally without a network call.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::api::{ApiError, BackendClient};

/// Longest story idea the backend will look at, in characters.
const MAX_IDEA_CHARS: usize = 2000;

/// Verdict on a piece of user text.
#[derive(Debug, Clone, PartialEq)]
pub enum Screening {
    Accepted,
    Rejected(Rejection),
}

impl Screening {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Screening::Accepted)
    }

    fn from_response(response: ScreeningResponse) -> Self {
        if response.allowed {
            Screening::Accepted
        } else {
            Screening::Rejected(Rejection {
                reason: response
                    .reason
                    .unwrap_or_else(|| "This idea can't be turned into a story.".to_string()),
                suggestion: response.suggestion,
                examples: response.examples,
            })
        }
    }
}

/// Why text was declined, with guidance for the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: String,
    pub suggestion: Option<String>,
    pub examples: Vec<String>,
}

/// Wire response from the screening endpoint.
///
/// `allowed` was `approved` before v2; the reason arrives under `reason`
/// or `rejectionReason`.
#[derive(Debug, Deserialize)]
pub struct ScreeningResponse {
    #[serde(default, alias = "approved")]
    pub allowed: bool,
    #[serde(default, alias = "rejectionReason")]
    pub reason: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

pub struct Screener {
    api: Arc<BackendClient>,
}

impl Screener {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }

    /// Screen a story idea before it is used for generation.
    pub async fn screen(&self, text: &str) -> Result<Screening, ApiError> {
        if let Some(rejection) = precheck(text) {
            debug!(reason = %rejection.reason, "story idea rejected locally");
            return Ok(Screening::Rejected(rejection));
        }
        let response = self.api.screen_text(text).await?;
        Ok(Screening::from_response(response))
    }
}

/// Local checks that need no network round trip.
fn precheck(text: &str) -> Option<Rejection> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Rejection {
            reason: "The story idea is empty.".to_string(),
            suggestion: Some("Describe who the story is about and what happens.".to_string()),
            examples: vec![
                "A shy dragon learns to roar".to_string(),
                "Two friends build a treehouse on the moon".to_string(),
            ],
        });
    }
    let chars = trimmed.chars().count();
    if chars > MAX_IDEA_CHARS {
        return Some(Rejection {
            reason: format!(
                "The story idea is too long ({} characters, limit {}).",
                chars, MAX_IDEA_CHARS
            ),
            suggestion: Some("Trim the idea down to its key moments.".to_string()),
            examples: Vec::new(),
        });
    }
    None
}
