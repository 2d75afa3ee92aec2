//! API client for the storynook backend REST API.
//!
//! This module provides the `BackendClient` struct for making authenticated
//! requests for story, character, template, favorite and coin data, plus
//! the identity and moderation endpoints.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::models::{
    AuthGrant, Character, CoinBalance, CoinTransaction, FavoriteStory, Story, StoryTemplate,
};
use crate::safety::ScreeningResponse;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the production backend. Overridable through configuration
/// for staging and local development.
pub const DEFAULT_API_BASE_URL: &str = "https://api.storynook.app";

/// HTTP request timeout in seconds.
/// 30s allows for slow story-generation responses while failing fast enough
/// for good UX on a phone connection.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

// ============================================================================
// Response wrappers
// ============================================================================

// List endpoints wrap their payload; v1 responses used a generic "items" key.

#[derive(Debug, Deserialize)]
struct StoriesResponse {
    #[serde(default, alias = "items")]
    stories: Vec<Story>,
}

#[derive(Debug, Deserialize)]
struct CharactersResponse {
    #[serde(default, alias = "items")]
    characters: Vec<Character>,
}

#[derive(Debug, Deserialize)]
struct TemplatesResponse {
    #[serde(default, alias = "items")]
    templates: Vec<StoryTemplate>,
}

#[derive(Debug, Deserialize)]
struct FavoritesResponse {
    #[serde(default, alias = "items")]
    favorites: Vec<FavoriteStory>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default, alias = "items")]
    transactions: Vec<CoinTransaction>,
}

/// API client for the storynook backend.
///
/// One instance is shared across the whole data layer behind an `Arc`; the
/// bearer token lives behind a lock so a sign-in or sign-out takes effect
/// for every holder at once.
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl BackendClient {
    /// Create a new client. Trailing slashes on the base URL are dropped so
    /// endpoint paths join cleanly.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Set or clear the bearer token for authenticated requests
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_token(&self) -> bool {
        self.bearer().is_some()
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying on 429 with exponential backoff. `make`
    /// rebuilds the request for each attempt.
    async fn send_with_retry<F>(&self, url: &str, make: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.authorize(make()).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn parse_json<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ApiError> {
        response.json().await.map_err(|err| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, err))
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.send_with_retry(url, || self.client.get(url)).await?;
        Self::parse_json(response, url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(url, || self.client.post(url).json(body))
            .await?;
        Self::parse_json(response, url).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .send_with_retry(url, || self.client.put(url).json(body))
            .await?;
        Self::parse_json(response, url).await
    }

    /// For endpoints that answer 204 No Content.
    async fn post_no_content<B: Serialize>(&self, url: &str, body: &B) -> Result<(), ApiError> {
        self.send_with_retry(url, || self.client.post(url).json(body))
            .await?;
        Ok(())
    }

    async fn delete_no_content(&self, url: &str) -> Result<(), ApiError> {
        self.send_with_retry(url, || self.client.delete(url)).await?;
        Ok(())
    }

    // ===== Identity =====

    /// Start an anonymous guest session
    pub async fn guest_session(&self) -> Result<AuthGrant, ApiError> {
        let url = format!("{}/v1/auth/guest", self.base_url);
        debug!("Requesting guest session");
        self.post(&url, &json!({})).await
    }

    /// Sign in with email credentials
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let url = format!("{}/v1/auth/sign-in", self.base_url);
        self.post(&url, &json!({ "email": email, "password": password })).await
    }

    /// Attach email credentials to the current (guest) session. The
    /// provider either creates the account or signs into an existing one;
    /// `AuthGrant::is_new_user` says which happened.
    pub async fn upgrade_account(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let url = format!("{}/v1/auth/upgrade", self.base_url);
        self.post(&url, &json!({ "email": email, "password": password })).await
    }

    /// Move the given guest user's content into the signed-in account
    pub async fn merge_guest_content(&self, guest_user_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/users/me/merge-guest", self.base_url);
        self.post_no_content(&url, &json!({ "guestUserId": guest_user_id })).await
    }

    /// Permanently delete the signed-in account and its content
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        let url = format!("{}/v1/users/me", self.base_url);
        self.delete_no_content(&url).await
    }

    // ===== Stories =====

    /// Fetch the user's stories, newest first
    pub async fn fetch_stories(&self, user_id: &str) -> Result<Vec<Story>, ApiError> {
        let url = format!("{}/v1/users/{}/stories", self.base_url, user_id);
        let response: StoriesResponse = self.get(&url).await?;
        Ok(response.stories)
    }

    pub async fn create_story(&self, story: &Story) -> Result<Story, ApiError> {
        let url = format!("{}/v1/stories", self.base_url);
        self.post(&url, story).await
    }

    pub async fn update_story(&self, story: &Story) -> Result<Story, ApiError> {
        let url = format!("{}/v1/stories/{}", self.base_url, story.id);
        self.put(&url, story).await
    }

    pub async fn delete_story(&self, story_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/stories/{}", self.base_url, story_id);
        self.delete_no_content(&url).await
    }

    // ===== Characters =====

    pub async fn fetch_characters(&self, user_id: &str) -> Result<Vec<Character>, ApiError> {
        let url = format!("{}/v1/users/{}/characters", self.base_url, user_id);
        let response: CharactersResponse = self.get(&url).await?;
        Ok(response.characters)
    }

    pub async fn create_character(&self, character: &Character) -> Result<Character, ApiError> {
        let url = format!("{}/v1/characters", self.base_url);
        self.post(&url, character).await
    }

    pub async fn update_character(&self, character: &Character) -> Result<Character, ApiError> {
        let url = format!("{}/v1/characters/{}", self.base_url, character.id);
        self.put(&url, character).await
    }

    pub async fn delete_character(&self, character_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/characters/{}", self.base_url, character_id);
        self.delete_no_content(&url).await
    }

    // ===== Templates =====

    /// Fetch the ready-made story catalog (shared across users)
    pub async fn fetch_templates(&self) -> Result<Vec<StoryTemplate>, ApiError> {
        let url = format!("{}/v1/templates", self.base_url);
        let response: TemplatesResponse = self.get(&url).await?;
        Ok(response.templates)
    }

    // ===== Favorites =====

    pub async fn fetch_favorites(&self, user_id: &str) -> Result<Vec<FavoriteStory>, ApiError> {
        let url = format!("{}/v1/users/{}/favorites", self.base_url, user_id);
        let response: FavoritesResponse = self.get(&url).await?;
        Ok(response.favorites)
    }

    pub async fn add_favorite(
        &self,
        user_id: &str,
        favorite: &FavoriteStory,
    ) -> Result<FavoriteStory, ApiError> {
        let url = format!(
            "{}/v1/users/{}/favorites/{}",
            self.base_url, user_id, favorite.story_id
        );
        self.put(&url, favorite).await
    }

    pub async fn remove_favorite(&self, user_id: &str, story_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/users/{}/favorites/{}", self.base_url, user_id, story_id);
        self.delete_no_content(&url).await
    }

    // ===== Coins =====

    pub async fn fetch_coin_balance(&self, user_id: &str) -> Result<CoinBalance, ApiError> {
        let url = format!("{}/v1/users/{}/coins/balance", self.base_url, user_id);
        self.get(&url).await
    }

    /// Fetch the coin transaction history, newest first
    pub async fn fetch_coin_transactions(
        &self,
        user_id: &str,
    ) -> Result<Vec<CoinTransaction>, ApiError> {
        let url = format!("{}/v1/users/{}/coins/transactions", self.base_url, user_id);
        let response: TransactionsResponse = self.get(&url).await?;
        Ok(response.transactions)
    }

    // ===== Moderation =====

    /// Submit user text to the content screening endpoint
    pub async fn screen_text(&self, text: &str) -> Result<ScreeningResponse, ApiError> {
        let url = format!("{}/v1/moderation/screen", self.base_url);
        self.post(&url, &json!({ "text": text })).await
    }
}
