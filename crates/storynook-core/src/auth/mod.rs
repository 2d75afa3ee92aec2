//! Authentication and session management.
//!
//! This module handles the full session lifecycle: anonymous guest
//! sessions, email sign-in, the guest-to-account upgrade (including the
//! merge rule for guest content), sign-out and account deletion.
//!
//! Sessions persist across launches inside an encrypted vault keyed by a
//! device secret in the OS keychain.

pub mod credentials;
pub mod manager;
pub mod session;
pub mod vault;

pub use credentials::CredentialStore;
pub use manager::{AuthManager, UpgradeOutcome};
pub use session::{Identity, Provider, SessionData};
pub use vault::SecretVault;
