//! The remote collaborator behind a repository.

use std::fmt;

use async_trait::async_trait;

use crate::api::ApiError;

use super::delta::Delta;

/// Partition key for a repository's cached collection: the signed-in user
/// for per-user collections, one shared slot for catalogs that do not
/// depend on who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(String);

impl Scope {
    const SHARED: &'static str = "shared";

    pub fn user(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    pub fn shared() -> Self {
        Self(Self::SHARED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote data source for one entity collection.
///
/// `fetch` returns the full collection for a scope. `apply` confirms one
/// optimistic [`Delta`] and returns the backend's view of the touched
/// entity; read-only collections answer every `apply` with an error.
/// Production implementations wrap the backend client; tests substitute
/// scripted sources.
#[async_trait]
pub trait CollectionSource<T: Send + Sync>: Send + Sync {
    async fn fetch(&self, scope: &Scope) -> Result<Vec<T>, ApiError>;

    async fn apply(&self, scope: &Scope, delta: &Delta<T>) -> Result<T, ApiError>;
}
