//! Application composition root.
//!
//! Everything the app shell needs is constructed once here and passed by
//! reference; there are no process-wide singletons. Signing in binds the
//! per-user repositories to the new user's scope, signing out unbinds
//! them, so no collection ever outlives its session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::BackendClient;
use crate::auth::{AuthManager, Identity, SecretVault, UpgradeOutcome};
use crate::cache::{Repository, Scope, StoreError};
use crate::config::Config;
use crate::models::{Character, CoinBalance, CoinTransaction, FavoriteStory, Story, StoryTemplate};
use crate::repos;
use crate::safety::Screener;

pub struct Services {
    pub config: Config,
    pub api: Arc<BackendClient>,
    pub auth: AuthManager,
    pub screener: Screener,
    pub stories: Repository<Story>,
    pub characters: Repository<Character>,
    pub templates: Repository<StoryTemplate>,
    pub favorites: Repository<FavoriteStory>,
    pub coin_activity: Repository<CoinTransaction>,
}

impl Services {
    /// Wire the full data layer from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let api = Arc::new(
            BackendClient::new(config.api_base_url())
                .context("Failed to construct backend client")?,
        );
        let data_dir = config.data_dir()?;
        let vault = SecretVault::open_default(&data_dir)?;
        let auth = AuthManager::new(Arc::clone(&api), vault);

        Ok(Self {
            screener: Screener::new(Arc::clone(&api)),
            stories: repos::story_repository(Arc::clone(&api)),
            characters: repos::character_repository(Arc::clone(&api)),
            templates: repos::template_repository(Arc::clone(&api)),
            favorites: repos::favorite_repository(Arc::clone(&api)),
            coin_activity: repos::coin_activity_repository(Arc::clone(&api)),
            config,
            api,
            auth,
        })
    }

    /// Restore a persisted session and bind the repositories to it.
    pub fn restore_session(&self) -> Result<Option<Identity>> {
        let identity = self.auth.restore()?;
        if let Some(ref identity) = identity {
            self.bind_user(&identity.user_id);
            info!(user = %identity.user_id, provider = %identity.provider, "session restored");
        }
        Ok(identity)
    }

    pub async fn sign_in_guest(&self) -> Result<Identity> {
        let identity = self.auth.sign_in_guest().await?;
        self.bind_user(&identity.user_id);
        Ok(identity)
    }

    pub async fn sign_in_email(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.auth.sign_in_email(email, password).await?;
        self.bind_user(&identity.user_id);
        Ok(identity)
    }

    /// Upgrade the current guest session to a permanent account. The
    /// account is a different scope, so rebinding wipes the guest-era
    /// caches; the next fetch sees the merged (or separate) content.
    pub async fn upgrade_to_account(&self, email: &str, password: &str) -> Result<UpgradeOutcome> {
        let outcome = self.auth.upgrade_to_account(email, password).await?;
        self.bind_user(&outcome.identity.user_id);
        Ok(outcome)
    }

    /// Sign out and drop every per-user collection. The shared template
    /// catalog stays warm; it holds nothing user-specific.
    pub fn sign_out(&self) -> Result<()> {
        self.auth.sign_out()?;
        self.unbind_user();
        Ok(())
    }

    pub async fn delete_account(&self) -> Result<()> {
        self.auth.delete_account().await?;
        self.unbind_user();
        Ok(())
    }

    /// Refresh all five collections concurrently. Failures are reported
    /// per repository, not short-circuited; one bad endpoint must not
    /// block the rest of a sync.
    pub async fn refresh_all(&self) -> Vec<(&'static str, Result<usize, StoreError>)> {
        let (stories, characters, templates, favorites, coins) = tokio::join!(
            self.stories.refresh(),
            self.characters.refresh(),
            self.templates.refresh(),
            self.favorites.refresh(),
            self.coin_activity.refresh(),
        );
        let report = vec![
            ("stories", stories.map(|items| items.len())),
            ("characters", characters.map(|items| items.len())),
            ("templates", templates.map(|items| items.len())),
            ("favorites", favorites.map(|items| items.len())),
            ("coin-activity", coins.map(|items| items.len())),
        ];
        for (name, outcome) in &report {
            if let Err(err) = outcome {
                warn!(repo = name, error = %err, "refresh failed");
            }
        }
        report
    }

    /// Current coin balance. A single value, fetched directly rather than
    /// through a repository.
    pub async fn coin_balance(&self) -> Result<CoinBalance> {
        let identity = self
            .auth
            .identity()
            .context("Not signed in")?;
        self.api
            .fetch_coin_balance(&identity.user_id)
            .await
            .context("Balance fetch failed")
    }

    fn bind_user(&self, user_id: &str) {
        self.stories.bind(Scope::user(user_id));
        self.characters.bind(Scope::user(user_id));
        self.favorites.bind(Scope::user(user_id));
        self.coin_activity.bind(Scope::user(user_id));
    }

    fn unbind_user(&self) {
        self.stories.unbind();
        self.characters.unbind();
        self.favorites.unbind();
        self.coin_activity.unbind();
    }
}
