//! Sign-in flows and the guest-upgrade merge rule.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::api::BackendClient;
use crate::models::AuthGrant;

use super::session::{Identity, Provider, SessionData};
use super::vault::SecretVault;

/// What an account upgrade produced.
#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    pub identity: Identity,
    /// Whether the guest content was carried into the account.
    pub merged: bool,
}

/// Owns the current session: establishes it, persists it through the
/// vault, and keeps the shared API client's bearer token in step.
pub struct AuthManager {
    api: Arc<BackendClient>,
    vault: SecretVault,
    session: Mutex<Option<SessionData>>,
}

impl AuthManager {
    pub fn new(api: Arc<BackendClient>, vault: SecretVault) -> Self {
        Self {
            api,
            vault,
            session: Mutex::new(None),
        }
    }

    /// Restore a persisted, unexpired session from the vault. Returns the
    /// restored identity, or `None` when the app starts signed out.
    pub fn restore(&self) -> Result<Option<Identity>> {
        let Some(session) = self.vault.load()? else {
            return Ok(None);
        };
        if session.is_expired() {
            info!(user = %session.user_id, "persisted session expired, discarding");
            self.vault.wipe()?;
            return Ok(None);
        }
        self.api.set_token(Some(session.token.clone()));
        let identity = session.identity();
        *self.slot() = Some(session);
        Ok(Some(identity))
    }

    pub fn identity(&self) -> Option<Identity> {
        self.slot().as_ref().map(SessionData::identity)
    }

    pub fn is_signed_in(&self) -> bool {
        self.slot().is_some()
    }

    /// Minutes until the current session expires, for display.
    pub fn session_minutes_left(&self) -> Option<i64> {
        self.slot().as_ref().map(SessionData::minutes_until_expiry)
    }

    /// Start an anonymous guest session.
    pub async fn sign_in_guest(&self) -> Result<Identity> {
        let grant = self
            .api
            .guest_session()
            .await
            .context("Guest session request failed")?;
        self.install(grant, Provider::Guest)
    }

    /// Sign in with email credentials.
    pub async fn sign_in_email(&self, email: &str, password: &str) -> Result<Identity> {
        let grant = self
            .api
            .sign_in(email, password)
            .await
            .context("Sign-in request failed")?;
        self.install(grant, Provider::Email)
    }

    /// Upgrade the current guest session to a permanent account.
    ///
    /// Guest content is merged into the account only when the account was
    /// created by this very call. Signing into an account that already
    /// existed never pulls this device's guest data into it.
    pub async fn upgrade_to_account(&self, email: &str, password: &str) -> Result<UpgradeOutcome> {
        let Some(previous) = self.slot().clone() else {
            bail!("No active session to upgrade");
        };
        if !previous.is_anonymous() {
            bail!("Only guest sessions can be upgraded");
        }

        let grant = self
            .api
            .upgrade_account(email, password)
            .await
            .context("Account upgrade request failed")?;
        let merge = should_merge_guest_content(&previous, &grant);
        let identity = self.install(grant, Provider::Email)?;

        if merge {
            // Runs under the new account's token; the guest content still
            // exists server-side until this lands.
            self.api
                .merge_guest_content(&previous.user_id)
                .await
                .context("Account was created but the guest content merge failed")?;
            info!(from = %previous.user_id, to = %identity.user_id, "guest content merged into new account");
        } else {
            info!(user = %identity.user_id, "signed into existing account, guest content left behind");
        }

        Ok(UpgradeOutcome {
            identity,
            merged: merge,
        })
    }

    /// Sign out and forget the persisted session.
    pub fn sign_out(&self) -> Result<()> {
        *self.slot() = None;
        self.api.set_token(None);
        self.vault.wipe().context("Failed to wipe session vault")?;
        info!("signed out");
        Ok(())
    }

    /// Delete the account server-side, then drop all local session state.
    pub async fn delete_account(&self) -> Result<()> {
        let Some(session) = self.slot().clone() else {
            bail!("No active session");
        };
        self.api
            .delete_account()
            .await
            .context("Account deletion request failed")?;
        info!(user = %session.user_id, "account deleted");
        self.sign_out()
    }

    fn install(&self, grant: AuthGrant, provider: Provider) -> Result<Identity> {
        let session = SessionData::new(grant.user_id, grant.token, provider, grant.expires_in);
        self.api.set_token(Some(session.token.clone()));
        // A vault write failure downgrades to an in-memory session rather
        // than blocking the sign-in.
        if let Err(err) = self.vault.save(&session) {
            warn!(error = %err, "failed to persist session, continuing in memory");
        }
        let identity = session.identity();
        *self.slot() = Some(session);
        Ok(identity)
    }

    fn slot(&self) -> MutexGuard<'_, Option<SessionData>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The merge guard: carry guest content into the account only when the
/// prior session was anonymous and the provider says this call created the
/// account.
fn should_merge_guest_content(previous: &SessionData, grant: &AuthGrant) -> bool {
    previous.is_anonymous() && grant.is_new_user
}
