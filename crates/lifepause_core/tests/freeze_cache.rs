use async_trait::async_trait;
use lifepause_core::{
    ActiveFreeze, Clock, FreezeCacheError, FreezeInvalidation, FreezeStateCache, FreezeStateStore,
    GuardConfig, ModuleTag, OwnerId, StoreError,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

const TTL: Duration = Duration::from_secs(60);

struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
struct FakeStore {
    active: Mutex<HashMap<OwnerId, Vec<ModuleTag>>>,
    reads: AtomicUsize,
    latency: Duration,
}

impl FakeStore {
    fn slow(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn freeze(&self, owner_id: OwnerId, modules: &[ModuleTag]) {
        self.active
            .lock()
            .unwrap()
            .insert(owner_id, modules.to_vec());
    }

    fn unfreeze(&self, owner_id: OwnerId) {
        self.active.lock().unwrap().remove(&owner_id);
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FreezeStateStore for FakeStore {
    async fn find_active_with_modules(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self
            .active
            .lock()
            .unwrap()
            .get(&owner_id)
            .map(|modules| ActiveFreeze {
                period_id: Uuid::nil(),
                modules: modules.iter().copied().collect(),
            }))
    }
}

struct FailingStore {
    reads: AtomicUsize,
    latency: Duration,
}

#[async_trait]
impl FreezeStateStore for FailingStore {
    async fn find_active_with_modules(
        &self,
        _owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

struct StalledStore;

#[async_trait]
impl FreezeStateStore for StalledStore {
    async fn find_active_with_modules(
        &self,
        _owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }
}

fn config(store_timeout: Duration) -> GuardConfig {
    GuardConfig {
        cache_ttl: TTL,
        store_timeout,
        ..GuardConfig::default()
    }
}

fn cache_over(store: Arc<FakeStore>, clock: Arc<ManualClock>) -> FreezeStateCache {
    FreezeStateCache::with_clock(store, clock, config(Duration::from_secs(2)))
}

#[tokio::test]
async fn owner_without_active_period_gets_empty_set() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));

    let frozen = cache.get(Uuid::new_v4()).await.unwrap();
    assert!(frozen.is_empty());
}

#[tokio::test]
async fn repeated_gets_within_ttl_read_store_once() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));
    let owner = Uuid::new_v4();
    store.freeze(owner, &[ModuleTag::Finance, ModuleTag::Home]);

    for _ in 0..25 {
        let frozen = cache.get(owner).await.unwrap();
        assert_eq!(
            *frozen,
            BTreeSet::from([ModuleTag::Finance, ModuleTag::Home])
        );
    }
    assert_eq!(store.reads(), 1);
}

#[tokio::test]
async fn expired_entry_is_refreshed() {
    let store = Arc::new(FakeStore::default());
    let clock = Arc::new(ManualClock::new());
    let cache = cache_over(store.clone(), clock.clone());
    let owner = Uuid::new_v4();
    store.freeze(owner, &[ModuleTag::Habits]);

    assert!(cache.get(owner).await.unwrap().contains(&ModuleTag::Habits));
    store.unfreeze(owner);

    clock.advance(TTL - Duration::from_millis(1));
    assert!(cache.get(owner).await.unwrap().contains(&ModuleTag::Habits));
    assert_eq!(store.reads(), 1);

    clock.advance(Duration::from_millis(1));
    assert!(cache.get(owner).await.unwrap().is_empty());
    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn invalidate_forces_read_inside_ttl() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));
    let owner = Uuid::new_v4();

    assert!(cache.get(owner).await.unwrap().is_empty());
    store.freeze(owner, &[ModuleTag::Studies]);
    cache.invalidate(owner);

    assert!(cache.get(owner).await.unwrap().contains(&ModuleTag::Studies));
    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn invalidate_only_touches_that_owner() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    cache.get(alice).await.unwrap();
    cache.get(bob).await.unwrap();
    FreezeInvalidation::invalidate(&cache, alice);

    cache.get(alice).await.unwrap();
    cache.get(bob).await.unwrap();
    assert_eq!(store.reads(), 3);
}

#[tokio::test]
async fn invalidate_all_clears_every_owner() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));
    let owners: Vec<_> = (0..4).map(|_| Uuid::new_v4()).collect();

    for owner in &owners {
        cache.get(*owner).await.unwrap();
    }
    assert_eq!(cache.cached_owner_count(), 4);

    cache.invalidate_all();
    assert_eq!(cache.cached_owner_count(), 0);

    for owner in &owners {
        cache.get(*owner).await.unwrap();
    }
    assert_eq!(store.reads(), 8);
}

#[tokio::test]
async fn store_failure_is_returned_and_not_cached() {
    let store = Arc::new(FailingStore {
        reads: AtomicUsize::new(0),
        latency: Duration::ZERO,
    });
    let cache = FreezeStateCache::with_clock(
        store.clone(),
        Arc::new(ManualClock::new()),
        config(Duration::from_secs(2)),
    );
    let owner = Uuid::new_v4();

    let err = cache.get(owner).await.unwrap_err();
    assert!(matches!(err, FreezeCacheError::Store(_)));
    assert_eq!(cache.cached_owner_count(), 0);

    cache.get(owner).await.unwrap_err();
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_store_times_out() {
    let cache = FreezeStateCache::with_clock(
        Arc::new(StalledStore),
        Arc::new(ManualClock::new()),
        config(Duration::from_millis(250)),
    );

    let err = cache.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, FreezeCacheError::Timeout(limit) if limit == Duration::from_millis(250)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_owners_are_cached_independently() {
    let store = Arc::new(FakeStore::default());
    let cache = Arc::new(cache_over(store.clone(), Arc::new(ManualClock::new())));
    let owners: Vec<_> = (0..16).map(|_| Uuid::new_v4()).collect();
    for (index, owner) in owners.iter().enumerate() {
        if index % 2 == 0 {
            store.freeze(*owner, &[ModuleTag::Work]);
        }
    }

    let mut tasks = Vec::new();
    for (index, owner) in owners.iter().copied().enumerate() {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            let frozen = cache.get(owner).await.unwrap();
            assert_eq!(frozen.contains(&ModuleTag::Work), index % 2 == 0);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for owner in &owners {
        cache.get(*owner).await.unwrap();
    }
    assert_eq!(store.reads(), owners.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_misses_share_one_store_read() {
    let store = Arc::new(FakeStore::slow(Duration::from_millis(50)));
    let cache = Arc::new(cache_over(store.clone(), Arc::new(ManualClock::new())));
    let owner = Uuid::new_v4();
    store.freeze(owner, &[ModuleTag::Finance]);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(owner).await })
        })
        .collect();
    for task in tasks {
        let frozen = task.await.unwrap().unwrap();
        assert!(frozen.contains(&ModuleTag::Finance));
    }

    assert_eq!(store.reads(), 1);
    assert_eq!(cache.cached_owner_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn waiters_share_a_failed_read_without_caching_it() {
    let store = Arc::new(FailingStore {
        reads: AtomicUsize::new(0),
        latency: Duration::from_millis(50),
    });
    let cache = Arc::new(FreezeStateCache::with_clock(
        store.clone(),
        Arc::new(ManualClock::new()),
        config(Duration::from_secs(2)),
    ));
    let owner = Uuid::new_v4();

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(owner).await })
        })
        .collect();
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, FreezeCacheError::Store(_)));
    }
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert_eq!(cache.tracked_owner_count(), 0);

    cache.get(owner).await.unwrap_err();
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn waiter_takes_over_when_the_reading_caller_is_cancelled() {
    let store = Arc::new(FakeStore::slow(Duration::from_secs(10)));
    let cache = Arc::new(FreezeStateCache::with_clock(
        store.clone(),
        Arc::new(ManualClock::new()),
        config(Duration::from_secs(60)),
    ));
    let owner = Uuid::new_v4();
    store.freeze(owner, &[ModuleTag::Home]);

    let first = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get(owner).await })
    };
    tokio::task::yield_now().await;
    let second = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get(owner).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(store.reads(), 1);

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    let frozen = second.await.unwrap().unwrap();
    assert!(frozen.contains(&ModuleTag::Home));
    assert_eq!(store.reads(), 2);
    assert_eq!(cache.cached_owner_count(), 1);
}

#[tokio::test]
async fn tracked_owners_stay_within_max_entries() {
    let store = Arc::new(FakeStore::default());
    let clock = Arc::new(ManualClock::new());
    let cache = FreezeStateCache::with_clock(
        store.clone(),
        clock.clone(),
        GuardConfig {
            max_entries: 3,
            ..config(Duration::from_secs(2))
        },
    );
    let owners: Vec<_> = (0..5).map(|_| Uuid::new_v4()).collect();

    for owner in &owners[..4] {
        cache.get(*owner).await.unwrap();
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(cache.tracked_owner_count(), 3);
    assert_eq!(store.reads(), 4);

    // The stalest owner was evicted; the newest is still served from memory.
    cache.get(owners[3]).await.unwrap();
    assert_eq!(store.reads(), 4);
    cache.get(owners[0]).await.unwrap();
    assert_eq!(store.reads(), 5);
    assert_eq!(cache.tracked_owner_count(), 3);

    // Once everything has expired, admitting a new owner sweeps the rest.
    clock.advance(TTL);
    cache.get(owners[4]).await.unwrap();
    assert_eq!(cache.tracked_owner_count(), 1);
}

#[tokio::test]
async fn invalidating_unseen_owners_tracks_nothing() {
    let store = Arc::new(FakeStore::default());
    let cache = cache_over(store.clone(), Arc::new(ManualClock::new()));

    for _ in 0..100 {
        cache.invalidate(Uuid::new_v4());
    }
    assert_eq!(cache.tracked_owner_count(), 0);

    let owner = Uuid::new_v4();
    cache.get(owner).await.unwrap();
    cache.invalidate(owner);
    assert_eq!(cache.tracked_owner_count(), 0);
}
