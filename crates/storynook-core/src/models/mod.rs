//! Wire and domain models for the storynook backend.
//!
//! Two tiers of schema tolerance: endpoints that only renamed fields use
//! serde aliases in place; endpoints that also changed scalar types
//! (stories, the coin ledger, identity) decode by hand through
//! [`decode`]'s ordered fallback extractors.

pub mod auth;
pub mod character;
pub mod coins;
pub mod decode;
pub mod favorite;
pub mod story;
pub mod template;

pub use auth::AuthGrant;
pub use character::Character;
pub use coins::{CoinBalance, CoinTransaction, TransactionKind};
pub use favorite::FavoriteStory;
pub use story::{Story, StoryStatus};
pub use template::StoryTemplate;
