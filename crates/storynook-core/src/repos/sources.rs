//! `CollectionSource` implementations over the backend client.
//!
//! Each source maps a repository's fetch and delta confirmations onto the
//! REST endpoints for its collection. Read-only collections answer every
//! delta with `BadRequest` so a programming error surfaces instead of
//! silently passing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ApiError, BackendClient};
use crate::cache::{CollectionSource, Delta, Scope};
use crate::models::{Character, CoinTransaction, FavoriteStory, Story, StoryTemplate};

pub struct StorySource {
    api: Arc<BackendClient>,
}

impl StorySource {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource<Story> for StorySource {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<Story>, ApiError> {
        self.api.fetch_stories(scope.as_str()).await
    }

    async fn apply(&self, _scope: &Scope, delta: &Delta<Story>) -> Result<Story, ApiError> {
        match delta {
            Delta::Insert(story) => self.api.create_story(story).await,
            Delta::Update(story) => self.api.update_story(story).await,
            Delta::Remove(story) => {
                self.api.delete_story(&story.id).await?;
                Ok(story.clone())
            }
        }
    }
}

pub struct CharacterSource {
    api: Arc<BackendClient>,
}

impl CharacterSource {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource<Character> for CharacterSource {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<Character>, ApiError> {
        self.api.fetch_characters(scope.as_str()).await
    }

    async fn apply(&self, _scope: &Scope, delta: &Delta<Character>) -> Result<Character, ApiError> {
        match delta {
            Delta::Insert(character) => self.api.create_character(character).await,
            Delta::Update(character) => self.api.update_character(character).await,
            Delta::Remove(character) => {
                self.api.delete_character(&character.id).await?;
                Ok(character.clone())
            }
        }
    }
}

pub struct TemplateSource {
    api: Arc<BackendClient>,
}

impl TemplateSource {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource<StoryTemplate> for TemplateSource {
    async fn fetch(&self, _scope: &Scope) -> Result<Vec<StoryTemplate>, ApiError> {
        self.api.fetch_templates().await
    }

    async fn apply(
        &self,
        _scope: &Scope,
        _delta: &Delta<StoryTemplate>,
    ) -> Result<StoryTemplate, ApiError> {
        Err(ApiError::BadRequest(
            "the template catalog is read-only".to_string(),
        ))
    }
}

pub struct FavoriteSource {
    api: Arc<BackendClient>,
}

impl FavoriteSource {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource<FavoriteStory> for FavoriteSource {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<FavoriteStory>, ApiError> {
        self.api.fetch_favorites(scope.as_str()).await
    }

    async fn apply(
        &self,
        scope: &Scope,
        delta: &Delta<FavoriteStory>,
    ) -> Result<FavoriteStory, ApiError> {
        match delta {
            Delta::Insert(favorite) => self.api.add_favorite(scope.as_str(), favorite).await,
            Delta::Update(_) => Err(ApiError::BadRequest(
                "favorites cannot be edited, only added or removed".to_string(),
            )),
            Delta::Remove(favorite) => {
                self.api
                    .remove_favorite(scope.as_str(), &favorite.story_id)
                    .await?;
                Ok(favorite.clone())
            }
        }
    }
}

pub struct CoinActivitySource {
    api: Arc<BackendClient>,
}

impl CoinActivitySource {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource<CoinTransaction> for CoinActivitySource {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<CoinTransaction>, ApiError> {
        self.api.fetch_coin_transactions(scope.as_str()).await
    }

    async fn apply(
        &self,
        _scope: &Scope,
        _delta: &Delta<CoinTransaction>,
    ) -> Result<CoinTransaction, ApiError> {
        // The ledger is written by purchases and spends server-side.
        Err(ApiError::BadRequest(
            "the coin ledger is read-only".to_string(),
        ))
    }
}
