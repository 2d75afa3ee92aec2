//! Cache-coherent repository over a remote entity collection.
//!
//! One `Repository<T>` is the single in-memory source of truth for one
//! collection within one scope (usually the signed-in user). It answers
//! warm reads synchronously without touching the network, lets every
//! concurrent caller join the one in-flight fetch, applies optimistic
//! mutations with rollback on remote failure, and publishes each accepted
//! snapshot to watch observers.
//!
//! A fetch commits through an epoch/sequence check: `clear()` and scope
//! rebinds bump the epoch, so a fetch that was racing a clear can never
//! resurrect pre-clear data, no matter how the network interleaves.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::collection::{CachedCollection, Freshness};
use super::delta::{Delta, Keyed};
use super::error::StoreError;
use super::source::{CollectionSource, Scope};

/// Outcome every joiner of one in-flight fetch receives.
type FetchResult<T> = Result<Vec<T>, StoreError>;

/// Handle onto the single outstanding fetch.
type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

/// What a failed fetch does to the items already on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep whatever was cached; the caller sees the error while observers
    /// keep showing the stale collection.
    #[default]
    KeepStale,
    /// Empty the collection and mark it cold, for screens that prefer an
    /// explicit empty state over stale rows.
    ClearItems,
}

struct InFlight<T> {
    seq: u64,
    result: SharedFetch<T>,
    abort: AbortHandle,
}

struct RepoState<T> {
    cache: CachedCollection<T>,
    scope: Option<Scope>,
    in_flight: Option<InFlight<T>>,
    loading: bool,
    last_error: Option<StoreError>,
    /// Monotonic count of fetches ever started; stamps each one.
    fetch_seq: u64,
    /// Bumped by `clear()` and rebinds; a commit from an older epoch is
    /// discarded.
    epoch: u64,
}

struct RepoInner<T> {
    name: &'static str,
    source: Arc<dyn CollectionSource<T>>,
    failure_policy: FailurePolicy,
    state: Mutex<RepoState<T>>,
    watch_tx: watch::Sender<Vec<T>>,
    /// Serializes optimistic mutations so two rollback snapshots can never
    /// interleave across the remote round trip.
    mutation_gate: tokio::sync::Mutex<()>,
}

pub struct Repository<T> {
    inner: Arc<RepoInner<T>>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Repository<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, source: Arc<dyn CollectionSource<T>>, ttl: Duration) -> Self {
        Self::with_policy(name, source, ttl, FailurePolicy::default())
    }

    pub fn with_policy(
        name: &'static str,
        source: Arc<dyn CollectionSource<T>>,
        ttl: Duration,
        failure_policy: FailurePolicy,
    ) -> Self {
        let (watch_tx, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(RepoInner {
                name,
                source,
                failure_policy,
                state: Mutex::new(RepoState {
                    cache: CachedCollection::new(ttl),
                    scope: None,
                    in_flight: None,
                    loading: false,
                    last_error: None,
                    fetch_seq: 0,
                    epoch: 0,
                }),
                watch_tx,
                mutation_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Current items, whatever their freshness. Never touches the network.
    pub fn peek(&self) -> Vec<T> {
        self.inner.state().cache.items().to_vec()
    }

    /// Observe published snapshots. A new receiver sees the current
    /// snapshot immediately and every accepted change after it.
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.inner.watch_tx.subscribe()
    }

    /// True while a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.state().loading
    }

    /// The most recent failed operation, cleared by the next success.
    pub fn last_error(&self) -> Option<StoreError> {
        self.inner.state().last_error.clone()
    }

    pub fn age(&self) -> Option<Duration> {
        self.inner.state().cache.age()
    }

    pub fn freshness(&self) -> Freshness {
        self.inner.state().cache.freshness()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.inner.state().scope.clone()
    }

    /// Bind to a scope. Rebinding to a different scope wipes all prior
    /// state so one user's collection can never leak into the next
    /// session; rebinding to the same scope is a no-op.
    pub fn bind(&self, scope: Scope) {
        let mut state = self.inner.state();
        if state.scope.as_ref() == Some(&scope) {
            return;
        }
        info!(repo = self.inner.name, scope = %scope, "binding repository scope");
        self.inner.reset_locked(&mut state);
        state.scope = Some(scope);
    }

    /// Drop the bound scope along with all cached state.
    pub fn unbind(&self) {
        let mut state = self.inner.state();
        state.scope = None;
        self.inner.reset_locked(&mut state);
        info!(repo = self.inner.name, "repository unbound");
    }

    /// Wipe items and freshness and cancel any in-flight fetch. Idempotent.
    /// The bound scope is kept; the next `get` starts from cold.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        self.inner.reset_locked(&mut state);
        debug!(repo = self.inner.name, "cache cleared");
    }

    /// Make the next `get` fetch again without touching the items
    /// observers currently display.
    pub fn invalidate(&self) {
        let mut state = self.inner.state();
        state.cache.mark_cold();
        debug!(repo = self.inner.name, "cache invalidated");
    }

    /// Return the collection, fetching only when the cache cannot answer.
    ///
    /// Warm cache: returns the items without suspending. Cold or stale
    /// cache: joins the in-flight fetch when one exists, otherwise starts
    /// one. What a failed fetch leaves behind is decided by the
    /// repository's [`FailurePolicy`].
    pub async fn get(&self) -> Result<Vec<T>, StoreError> {
        self.read(false).await
    }

    /// Fetch regardless of freshness. An already in-flight fetch is joined
    /// rather than doubled, so a refresh storm still costs one request.
    pub async fn refresh(&self) -> Result<Vec<T>, StoreError> {
        self.read(true).await
    }

    async fn read(&self, force: bool) -> Result<Vec<T>, StoreError> {
        let fetch = {
            let mut state = self.inner.state();
            let scope = match state.scope.clone() {
                Some(scope) => scope,
                None => return Err(StoreError::Unbound(self.inner.name)),
            };
            if !force && state.cache.is_warm() {
                debug!(repo = self.inner.name, items = state.cache.len(), "cache hit");
                return Ok(state.cache.items().to_vec());
            }
            match &state.in_flight {
                Some(in_flight) => {
                    debug!(repo = self.inner.name, seq = in_flight.seq, "joining in-flight fetch");
                    in_flight.result.clone()
                }
                None => self.begin_fetch(&mut state, scope),
            }
        };
        fetch.await
    }

    /// Start a fetch for `scope` and install it as the in-flight slot.
    /// Caller holds the lock and has verified no fetch is in flight.
    fn begin_fetch(&self, state: &mut RepoState<T>, scope: Scope) -> SharedFetch<T> {
        state.fetch_seq += 1;
        state.loading = true;
        let seq = state.fetch_seq;
        let epoch = state.epoch;
        debug!(repo = self.inner.name, seq, scope = %scope, "starting fetch");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            // The commit must run even when the source panics; a skipped
            // commit would leave a dead in-flight slot that every later
            // get() joins instead of starting a fresh fetch.
            let outcome = match AssertUnwindSafe(inner.source.fetch(&scope)).catch_unwind().await {
                Ok(fetched) => fetched.map_err(StoreError::fetch),
                Err(panic) => Err(StoreError::Interrupted(panic_text(&panic))),
            };
            inner.commit(seq, epoch, outcome)
        });
        let abort = task.abort_handle();
        let result: SharedFetch<T> = task
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => Err(StoreError::Cancelled),
                Err(err) => Err(StoreError::Interrupted(err.to_string())),
            })
            .boxed()
            .shared();

        state.in_flight = Some(InFlight {
            seq,
            result: result.clone(),
            abort,
        });
        result
    }

    /// Apply `delta` to the cached collection, then confirm it remotely.
    ///
    /// The local change lands before the remote call starts, so `peek` and
    /// observers reflect it immediately; awaiting yields the backend's view
    /// of the touched entity. On remote failure the pre-change snapshot is
    /// restored before the error is returned. An update or remove whose
    /// target is not cached fails with [`StoreError::MissingEntity`] and
    /// makes no network call.
    pub async fn mutate(&self, delta: Delta<T>) -> Result<T, StoreError> {
        let _gate = self.inner.mutation_gate.lock().await;

        let (snapshot, scope, epoch) = {
            let mut state = self.inner.state();
            let scope = match state.scope.clone() {
                Some(scope) => scope,
                None => return Err(StoreError::Unbound(self.inner.name)),
            };
            let snapshot = state.cache.items().to_vec();
            if delta.apply(state.cache.items_mut()).is_none() {
                return Err(StoreError::MissingEntity(delta.key().to_string()));
            }
            self.inner.publish_locked(&state);
            (snapshot, scope, state.epoch)
        };
        debug!(
            repo = self.inner.name,
            kind = delta.kind(),
            key = delta.key(),
            "applied optimistic change"
        );

        match self.inner.source.apply(&scope, &delta).await {
            Ok(confirmed) => {
                let mut state = self.inner.state();
                state.last_error = None;
                debug!(repo = self.inner.name, key = delta.key(), "mutation confirmed");
                Ok(confirmed)
            }
            Err(err) => {
                let err = StoreError::mutation(err);
                let mut state = self.inner.state();
                // A clear or rebind while the confirmation was in flight
                // already wiped the collection and its error slot;
                // restoring the snapshot or stamping the error would
                // resurrect the dead session's state.
                if state.epoch == epoch {
                    state.cache.restore(snapshot);
                    state.last_error = Some(err.clone());
                    self.inner.publish_locked(&state);
                }
                warn!(
                    repo = self.inner.name,
                    key = delta.key(),
                    error = %err,
                    "mutation failed, rolled back"
                );
                Err(err)
            }
        }
    }
}

impl<T> RepoInner<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    fn state(&self) -> MutexGuard<'_, RepoState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_locked(&self, state: &RepoState<T>) {
        self.watch_tx.send_replace(state.cache.items().to_vec());
    }

    /// Shared tail of `clear`, `bind` and `unbind`. Caller holds the lock.
    fn reset_locked(&self, state: &mut RepoState<T>) {
        state.epoch += 1;
        if let Some(in_flight) = state.in_flight.take() {
            debug!(repo = self.name, seq = in_flight.seq, "aborting in-flight fetch");
            in_flight.abort.abort();
        }
        state.loading = false;
        state.cache.clear();
        state.last_error = None;
        self.publish_locked(state);
    }

    /// Land a finished fetch. Runs on the fetch task; the epoch check makes
    /// a commit that raced `clear()` a no-op for the cache.
    fn commit(&self, seq: u64, epoch: u64, outcome: FetchResult<T>) -> FetchResult<T> {
        let mut state = self.state();
        if state.in_flight.as_ref().map(|f| f.seq) == Some(seq) {
            state.in_flight = None;
            state.loading = false;
        }
        if state.epoch != epoch {
            debug!(repo = self.name, seq, "discarding fetch committed after a clear");
            return Err(StoreError::Cancelled);
        }
        match outcome {
            Ok(items) => {
                state.cache.replace(items.clone());
                state.last_error = None;
                self.publish_locked(&state);
                info!(repo = self.name, count = items.len(), "collection refreshed");
                Ok(items)
            }
            Err(err) => {
                warn!(repo = self.name, error = %err, "fetch failed");
                state.last_error = Some(err.clone());
                if self.failure_policy == FailurePolicy::ClearItems {
                    state.cache.clear();
                    self.publish_locked(&state);
                }
                Err(err)
            }
        }
    }
}

/// Best-effort text of a panic payload, for the error joiners receive.
fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "fetch task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::api::ApiError;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(180);

    #[derive(Debug, Clone, PartialEq)]
    struct Card {
        id: String,
    }

    impl Keyed for Card {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn card(id: &str) -> Card {
        Card { id: id.to_string() }
    }

    fn server_err() -> ApiError {
        ApiError::ServerError("boom".into())
    }

    struct ScriptedSource {
        fetches: Mutex<VecDeque<Result<Vec<Card>, ApiError>>>,
        fetch_calls: AtomicUsize,
        fetch_gate: Option<Arc<Notify>>,
        mutations: Mutex<VecDeque<Result<(), ApiError>>>,
        mutation_calls: AtomicUsize,
        mutation_gate: Option<Arc<Notify>>,
        scopes_seen: Mutex<Vec<String>>,
    }

    fn scripted(fetches: Vec<Result<Vec<Card>, ApiError>>) -> ScriptedSource {
        ScriptedSource {
            fetches: Mutex::new(fetches.into()),
            fetch_calls: AtomicUsize::new(0),
            fetch_gate: None,
            mutations: Mutex::new(VecDeque::new()),
            mutation_calls: AtomicUsize::new(0),
            mutation_gate: None,
            scopes_seen: Mutex::new(Vec::new()),
        }
    }

    #[async_trait]
    impl CollectionSource<Card> for ScriptedSource {
        async fn fetch(&self, scope: &Scope) -> Result<Vec<Card>, ApiError> {
            self.scopes_seen.lock().unwrap().push(scope.to_string());
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.fetch_gate {
                gate.notified().await;
            }
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
        }

        async fn apply(&self, _scope: &Scope, delta: &Delta<Card>) -> Result<Card, ApiError> {
            self.mutation_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.mutation_gate {
                gate.notified().await;
            }
            let outcome = self.mutations.lock().unwrap().pop_front().unwrap_or(Ok(()));
            outcome.map(|_| match delta {
                Delta::Insert(item) | Delta::Update(item) | Delta::Remove(item) => item.clone(),
            })
        }
    }

    struct PanickingSource {
        fetch_calls: AtomicUsize,
    }

    #[async_trait]
    impl CollectionSource<Card> for PanickingSource {
        async fn fetch(&self, _scope: &Scope) -> Result<Vec<Card>, ApiError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            panic!("decoder blew up");
        }

        async fn apply(&self, _scope: &Scope, _delta: &Delta<Card>) -> Result<Card, ApiError> {
            unreachable!("fetch-only source")
        }
    }

    fn repo(source: Arc<ScriptedSource>) -> Repository<Card> {
        let repository = Repository::new("cards", source, TTL);
        repository.bind(Scope::user("u-1"));
        repository
    }

    /// Spin the (single-threaded) test runtime until `cond` holds.
    async fn until(cond: impl Fn() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_cache_answers_without_network() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a"), card("b")])]));
        let repo = repo(source.clone());

        let first = repo.get().await.unwrap();
        assert_eq!(first.len(), 2);

        advance(Duration::from_secs(60)).await;
        let second = repo.get().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_refetches() {
        let source = Arc::new(scripted(vec![
            Ok(vec![card("a")]),
            Ok(vec![card("a"), card("b")]),
        ]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        advance(Duration::from_secs(181)).await;
        let refreshed = repo.get().await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_equal_to_ttl_is_a_miss() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")]), Ok(vec![card("b")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        advance(TTL).await;
        repo.get().await.unwrap();
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let gate = Arc::new(Notify::new());
        let mut source = scripted(vec![Ok(vec![card("a")])]);
        source.fetch_gate = Some(gate.clone());
        let source = Arc::new(source);
        let repo = repo(source.clone());

        let spawn_get = |repo: Repository<Card>| tokio::spawn(async move { repo.get().await });
        let r1 = spawn_get(repo.clone());
        let r2 = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.refresh().await })
        };
        let r3 = spawn_get(repo.clone());

        until(|| source.fetch_calls.load(Ordering::SeqCst) == 1).await;
        assert!(repo.is_loading());

        gate.notify_one();
        assert_eq!(r1.await.unwrap().unwrap(), vec![card("a")]);
        assert_eq!(r2.await.unwrap().unwrap(), vec![card("a")]);
        assert_eq!(r3.await.unwrap().unwrap(), vec![card("a")]);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(!repo.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_callers_share_the_failure() {
        let gate = Arc::new(Notify::new());
        let mut source = scripted(vec![Err(server_err())]);
        source.fetch_gate = Some(gate.clone());
        let source = Arc::new(source);
        let repo = repo(source.clone());

        let r1 = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.get().await })
        };
        let r2 = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.get().await })
        };
        until(|| source.fetch_calls.load(Ordering::SeqCst) == 1).await;
        gate.notify_one();

        assert!(matches!(r1.await.unwrap(), Err(StoreError::Fetch(_))));
        assert!(matches!(r2.await.unwrap(), Err(StoreError::Fetch(_))));
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(repo.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_releases_the_in_flight_slot() {
        let source = Arc::new(PanickingSource {
            fetch_calls: AtomicUsize::new(0),
        });
        let repo = Repository::new("cards", source.clone(), TTL);
        repo.bind(Scope::user("u-1"));

        let first = repo.get().await;
        assert!(matches!(first, Err(StoreError::Interrupted(_))));
        assert!(!repo.is_loading());
        assert!(repo.last_error().is_some());

        // The dead fetch released its slot, so the next get tries again
        // instead of joining it.
        let second = repo.get().await;
        assert!(matches!(second, Err(StoreError::Interrupted(_))));
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_stale_items() {
        let source = Arc::new(scripted(vec![
            Ok(vec![card("a"), card("b")]),
            Err(server_err()),
        ]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        advance(Duration::from_secs(181)).await;

        let err = repo.get().await.unwrap_err();
        assert!(matches!(err, StoreError::Fetch(_)));
        assert_eq!(repo.peek(), vec![card("a"), card("b")]);
        assert!(repo.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_items_policy_wipes_on_failure() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")]), Err(server_err())]));
        let repo = Repository::with_policy("cards", source, TTL, FailurePolicy::ClearItems);
        repo.bind(Scope::user("u-1"));

        repo.get().await.unwrap();
        advance(Duration::from_secs(181)).await;

        repo.get().await.unwrap_err();
        assert!(repo.peek().is_empty());
        assert_eq!(repo.freshness(), Freshness::Cold);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_remove_rolls_back_on_failure() {
        let gate = Arc::new(Notify::new());
        let mut source = scripted(vec![Ok(vec![card("a"), card("b")])]);
        source.mutations = Mutex::new(VecDeque::from([Err(server_err())]));
        source.mutation_gate = Some(gate.clone());
        let source = Arc::new(source);
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        let mut observer = repo.subscribe();

        let handle = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.mutate(Delta::Remove(card("b"))).await })
        };
        until(|| source.mutation_calls.load(Ordering::SeqCst) == 1).await;

        // The removal is visible while the confirmation is still in flight.
        assert_eq!(repo.peek(), vec![card("a")]);
        observer.changed().await.unwrap();
        assert_eq!(*observer.borrow_and_update(), vec![card("a")]);

        gate.notify_one();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Mutation(_)));

        // Snapshot restored, observers told.
        assert_eq!(repo.peek(), vec![card("a"), card("b")]);
        observer.changed().await.unwrap();
        assert_eq!(*observer.borrow_and_update(), vec![card("a"), card("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_mutation_discards_rollback_and_error() {
        let gate = Arc::new(Notify::new());
        let mut source = scripted(vec![Ok(vec![card("a"), card("b")])]);
        source.mutations = Mutex::new(VecDeque::from([Err(server_err())]));
        source.mutation_gate = Some(gate.clone());
        let source = Arc::new(source);
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        let handle = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.mutate(Delta::Remove(card("b"))).await })
        };
        until(|| source.mutation_calls.load(Ordering::SeqCst) == 1).await;

        repo.clear();
        gate.notify_one();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Mutation(_)));

        // The cleared state stays cleared: no resurrected snapshot and no
        // error stamped from the dead session.
        assert!(repo.peek().is_empty());
        assert!(repo.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_mutation_confirms_and_keeps_change() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        let confirmed = repo.mutate(Delta::Insert(card("b"))).await.unwrap();
        assert_eq!(confirmed, card("b"));
        assert_eq!(repo.peek(), vec![card("b"), card("a")]);
        assert_eq!(source.mutation_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_missing_entity_fails_before_network() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        let err = repo.mutate(Delta::Update(card("zz"))).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingEntity(_)));
        assert_eq!(source.mutation_calls.load(Ordering::SeqCst), 0);
        assert_eq!(repo.peek(), vec![card("a")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_is_idempotent() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")]), Ok(vec![card("b")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        repo.clear();
        repo.clear();
        assert!(repo.peek().is_empty());
        assert_eq!(repo.freshness(), Freshness::Cold);
        assert_eq!(repo.age(), None);

        // Scope survives a clear; the next get starts from cold.
        let refetched = repo.get().await.unwrap();
        assert_eq!(refetched, vec![card("b")]);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_in_flight_fetch() {
        let gate = Arc::new(Notify::new());
        let mut source = scripted(vec![Ok(vec![card("a")])]);
        source.fetch_gate = Some(gate.clone());
        let source = Arc::new(source);
        let repo = repo(source.clone());

        let handle = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.get().await })
        };
        until(|| source.fetch_calls.load(Ordering::SeqCst) == 1).await;

        repo.clear();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert!(repo.peek().is_empty());
        assert!(!repo.is_loading());

        // A late wakeup of the dead fetch changes nothing.
        gate.notify_one();
        tokio::task::yield_now().await;
        assert!(repo.peek().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_keeps_display_until_next_get() {
        let source = Arc::new(scripted(vec![
            Ok(vec![card("a"), card("b")]),
            Ok(vec![card("c")]),
        ]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        repo.invalidate();

        // Items stay on display and nothing was fetched yet.
        assert_eq!(repo.peek(), vec![card("a"), card("b")]);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);

        // Well inside the ttl, yet the next get refetches.
        let refreshed = repo.get().await.unwrap();
        assert_eq!(refreshed, vec![card("c")]);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbound_repository_errors() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo: Repository<Card> = Repository::new("cards", source.clone(), TTL);

        assert!(matches!(repo.get().await, Err(StoreError::Unbound("cards"))));
        assert!(matches!(
            repo.mutate(Delta::Insert(card("a"))).await,
            Err(StoreError::Unbound("cards"))
        ));
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_wipes_previous_users_items() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")]), Ok(vec![card("b")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        repo.bind(Scope::user("u-2"));
        assert!(repo.peek().is_empty());

        let next = repo.get().await.unwrap();
        assert_eq!(next, vec![card("b")]);
        assert_eq!(*source.scopes_seen.lock().unwrap(), vec!["u-1", "u-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_same_scope_keeps_cache() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        repo.bind(Scope::user("u-1"));
        assert_eq!(repo.peek(), vec![card("a")]);
        repo.get().await.unwrap();
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbind_drops_scope_and_state() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo = repo(source.clone());

        repo.get().await.unwrap();
        repo.unbind();
        assert!(repo.peek().is_empty());
        assert!(repo.scope().is_none());
        assert!(matches!(repo.get().await, Err(StoreError::Unbound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_see_fetched_snapshot() {
        let source = Arc::new(scripted(vec![Ok(vec![card("a")])]));
        let repo = repo(source.clone());

        let mut observer = repo.subscribe();
        assert!(observer.borrow_and_update().is_empty());

        repo.get().await.unwrap();
        observer.changed().await.unwrap();
        assert_eq!(*observer.borrow_and_update(), vec![card("a")]);
    }
}
