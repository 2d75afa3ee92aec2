//! Typed repository failures.

use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced by a repository.
///
/// Every variant leaves the repository in a consistent state: the worst
/// outcome is a stale or empty collection the caller can retry into.
/// Cloneable because a single in-flight fetch shares its outcome with
/// every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The remote fetch failed and the cache could not answer.
    #[error("fetch failed: {0}")]
    Fetch(#[source] Arc<ApiError>),

    /// The remote confirmation failed; the optimistic local change was
    /// rolled back before this error was returned.
    #[error("mutation failed, local change rolled back: {0}")]
    Mutation(#[source] Arc<ApiError>),

    /// The in-flight fetch was cancelled by a cache clear or a scope
    /// rebind before it could land.
    #[error("fetch cancelled before completion")]
    Cancelled,

    /// The fetch task ended without producing a result.
    #[error("fetch interrupted: {0}")]
    Interrupted(String),

    /// The repository has no bound scope; nobody is signed in.
    #[error("{0} repository has no bound scope")]
    Unbound(&'static str),

    /// An update or remove targeted an entity the cached collection does
    /// not hold. Detected locally; no network call was made.
    #[error("entity {0} is not in the cached collection")]
    MissingEntity(String),
}

impl StoreError {
    pub(crate) fn fetch(err: ApiError) -> Self {
        Self::Fetch(Arc::new(err))
    }

    pub(crate) fn mutation(err: ApiError) -> Self {
        Self::Mutation(Arc::new(err))
    }

    /// True when retrying the same call later can reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(err) | Self::Mutation(err) => err.is_recoverable(),
            Self::Cancelled | Self::Interrupted(_) => true,
            Self::Unbound(_) | Self::MissingEntity(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability_follows_api_class() {
        assert!(StoreError::fetch(ApiError::RateLimited).is_recoverable());
        assert!(!StoreError::mutation(ApiError::Unauthorized).is_recoverable());
        assert!(StoreError::Cancelled.is_recoverable());
        assert!(!StoreError::Unbound("stories").is_recoverable());
        assert!(!StoreError::MissingEntity("st-1".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages_name_the_repository() {
        let message = StoreError::Unbound("favorites").to_string();
        assert!(message.contains("favorites"));
    }
}
