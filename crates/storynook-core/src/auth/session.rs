//! Session state for the current (guest or registered) user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default token lifetime in minutes, used when the identity provider does
/// not report one. Backend tokens stop being honored after ~60 minutes.
const SESSION_TTL_MINUTES: i64 = 60;

/// Buffer time before expiry to trigger refresh (10 minutes)
const SESSION_REFRESH_BUFFER_MINUTES: i64 = 10;

/// How the current identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anonymous device-local account, created without any credentials.
    Guest,
    Email,
    Apple,
    Google,
}

impl Provider {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Provider::Guest)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Provider::Guest => "guest",
            Provider::Email => "email",
            Provider::Apple => "apple",
            Provider::Google => "google",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    pub token: String,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    /// Token lifetime in seconds as reported at sign-in, when known.
    #[serde(default)]
    pub expires_in_secs: Option<i64>,
}

impl SessionData {
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        provider: Provider,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            provider,
            created_at: Utc::now(),
            expires_in_secs,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.provider.is_anonymous()
    }

    fn expires_at(&self) -> DateTime<Utc> {
        let lifetime = self
            .expires_in_secs
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::minutes(SESSION_TTL_MINUTES));
        self.created_at + lifetime
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.expires_at() - Duration::minutes(SESSION_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_minutes().max(0)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            provider: self.provider,
        }
    }
}

/// Read-only view of who is signed in, handed out to display code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub provider: Provider,
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        self.provider.is_anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(provider: Provider) -> SessionData {
        SessionData::new("u-1", "tok", provider, None)
    }

    #[test]
    fn test_fresh_session_is_valid() {
        let s = session(Provider::Email);
        assert!(!s.is_expired());
        assert!(!s.needs_refresh());
        assert!(s.minutes_until_expiry() > 45);
    }

    #[test]
    fn test_backdated_session_expires() {
        let mut s = session(Provider::Email);
        s.created_at = Utc::now() - Duration::minutes(SESSION_TTL_MINUTES + 1);
        assert!(s.is_expired());
        assert_eq!(s.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_needs_refresh_inside_buffer() {
        let mut s = session(Provider::Email);
        s.created_at = Utc::now() - Duration::minutes(SESSION_TTL_MINUTES - 5);
        assert!(!s.is_expired());
        assert!(s.needs_refresh());
    }

    #[test]
    fn test_provider_lifetime_overrides_default() {
        let mut s = SessionData::new("u-1", "tok", Provider::Email, Some(120));
        assert!(!s.is_expired());
        s.created_at = Utc::now() - Duration::seconds(121);
        assert!(s.is_expired());
    }

    #[test]
    fn test_only_guest_is_anonymous() {
        assert!(session(Provider::Guest).is_anonymous());
        assert!(!session(Provider::Email).is_anonymous());
        assert!(!session(Provider::Apple).is_anonymous());
    }
}
