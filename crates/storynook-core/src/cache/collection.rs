//! Freshness-tracked in-memory collection state.

use std::time::Duration;

use tokio::time::Instant;

/// Where a collection stands relative to its freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Never fetched (or wiped); holds no trustworthy data.
    Cold,
    /// Fetched within the ttl; readable without a network touch.
    Warm(Duration),
    /// Fetched, but the ttl has elapsed.
    Stale(Duration),
}

/// One cached entity collection and its freshness stamp.
///
/// Cold and stale are both cache misses; only the stamp decides, never
/// whether `items` happens to be empty (an empty collection fetched a
/// moment ago is a valid warm answer).
#[derive(Debug)]
pub struct CachedCollection<T> {
    items: Vec<T>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl<T> CachedCollection<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            fetched_at: None,
            ttl,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time since the last successful fetch, `None` when cold.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    /// Warm means fetched strictly less than one ttl ago. An age exactly
    /// equal to the ttl already counts as stale.
    pub fn is_warm(&self) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() < self.ttl,
            None => false,
        }
    }

    pub fn freshness(&self) -> Freshness {
        match self.age() {
            None => Freshness::Cold,
            Some(age) if age < self.ttl => Freshness::Warm(age),
            Some(age) => Freshness::Stale(age),
        }
    }

    /// Install a fetched collection and restart the freshness window.
    pub(crate) fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.fetched_at = Some(Instant::now());
    }

    /// Put back a pre-mutation snapshot. The freshness stamp is left
    /// alone: a rolled-back mutation says nothing about how old the last
    /// fetch is.
    pub(crate) fn restore(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Forget the freshness stamp but keep the items on display.
    pub(crate) fn mark_cold(&mut self) {
        self.fetched_at = None;
    }

    /// Drop items and stamp both.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.fetched_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(180);

    #[test]
    fn test_starts_cold() {
        let collection: CachedCollection<u32> = CachedCollection::new(TTL);
        assert_eq!(collection.freshness(), Freshness::Cold);
        assert!(!collection.is_warm());
        assert_eq!(collection.age(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_within_ttl() {
        let mut collection = CachedCollection::new(TTL);
        collection.replace(vec![1, 2]);
        advance(Duration::from_secs(60)).await;
        assert!(collection.is_warm());
        assert_eq!(collection.freshness(), Freshness::Warm(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_at_exact_ttl() {
        let mut collection = CachedCollection::new(TTL);
        collection.replace(vec![1]);
        advance(TTL).await;
        assert!(!collection.is_warm());
        assert_eq!(collection.freshness(), Freshness::Stale(TTL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fetch_is_still_warm() {
        let mut collection: CachedCollection<u32> = CachedCollection::new(TTL);
        collection.replace(Vec::new());
        assert!(collection.is_warm());
        assert!(collection.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_cold_keeps_items() {
        let mut collection = CachedCollection::new(TTL);
        collection.replace(vec![1, 2]);
        collection.mark_cold();
        assert_eq!(collection.freshness(), Freshness::Cold);
        assert_eq!(collection.items(), &[1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_items_and_stamp() {
        let mut collection = CachedCollection::new(TTL);
        collection.replace(vec![1, 2]);
        collection.clear();
        assert!(collection.is_empty());
        assert_eq!(collection.freshness(), Freshness::Cold);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_keeps_freshness_stamp() {
        let mut collection = CachedCollection::new(TTL);
        collection.replace(vec![1, 2]);
        advance(Duration::from_secs(30)).await;
        collection.restore(vec![1]);
        assert_eq!(collection.age(), Some(Duration::from_secs(30)));
        assert!(collection.is_warm());
    }
}
