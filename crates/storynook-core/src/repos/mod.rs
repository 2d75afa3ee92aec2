//! The app's five entity repositories.
//!
//! One generic [`Repository`] instantiation per collection, each with its
//! own freshness window and remote source. The constructors here wire the
//! shared backend client in; tests substitute scripted sources through
//! [`Repository::new`] directly.

pub mod sources;

use std::sync::Arc;
use std::time::Duration;

use crate::api::BackendClient;
use crate::cache::{FailurePolicy, Repository, Scope};
use crate::models::{Character, CoinTransaction, FavoriteStory, Story, StoryTemplate};

use sources::{CharacterSource, CoinActivitySource, FavoriteSource, StorySource, TemplateSource};

/// Stories change as generation completes; three minutes keeps the shelf
/// current without refetching on every screen change.
pub const STORY_TTL: Duration = Duration::from_secs(180);

/// Saved characters change rarely.
pub const CHARACTER_TTL: Duration = Duration::from_secs(300);

/// The template catalog is editorial content, updated server-side a few
/// times a day at most.
pub const TEMPLATE_TTL: Duration = Duration::from_secs(1800);

/// Favorites are toggled from several screens; keep parity with stories.
pub const FAVORITE_TTL: Duration = Duration::from_secs(180);

/// Coin history must reflect a purchase soon after the paywall closes.
pub const COIN_ACTIVITY_TTL: Duration = Duration::from_secs(120);

pub fn story_repository(api: Arc<BackendClient>) -> Repository<Story> {
    Repository::new("stories", Arc::new(StorySource::new(api)), STORY_TTL)
}

pub fn character_repository(api: Arc<BackendClient>) -> Repository<Character> {
    Repository::new("characters", Arc::new(CharacterSource::new(api)), CHARACTER_TTL)
}

/// The catalog is user-independent, so it is bound to the shared scope at
/// construction and survives sign-out.
pub fn template_repository(api: Arc<BackendClient>) -> Repository<StoryTemplate> {
    let repository = Repository::new("templates", Arc::new(TemplateSource::new(api)), TEMPLATE_TTL);
    repository.bind(Scope::shared());
    repository
}

pub fn favorite_repository(api: Arc<BackendClient>) -> Repository<FavoriteStory> {
    Repository::new("favorites", Arc::new(FavoriteSource::new(api)), FAVORITE_TTL)
}

/// Coin history prefers an explicit empty state over stale rows when the
/// ledger endpoint fails, so this repository clears on fetch failure.
pub fn coin_activity_repository(api: Arc<BackendClient>) -> Repository<CoinTransaction> {
    Repository::with_policy(
        "coin-activity",
        Arc::new(CoinActivitySource::new(api)),
        COIN_ACTIVITY_TTL,
        FailurePolicy::ClearItems,
    )
}
