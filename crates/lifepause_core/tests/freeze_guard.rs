use async_trait::async_trait;
use chrono::NaiveDate;
use lifepause_core::db::open_shared_db;
use lifepause_core::{
    build_guard, ActiveFreeze, AllowReason, AuthFailure, FreezeGuard, FreezeReason, FreezeService,
    FreezeStateCache, FreezeStateStore, GuardConfig, GuardDecision, ModuleTag, OwnerId,
    RequestVerb, ScheduleFreezeRequest, SqliteFreezePeriodRepository, SqliteFreezeStore,
    StoreError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct FakeStore {
    active: Mutex<HashMap<OwnerId, Vec<ModuleTag>>>,
    reads: AtomicUsize,
}

#[async_trait]
impl FreezeStateStore for FakeStore {
    async fn find_active_with_modules(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
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

struct DownStore;

#[async_trait]
impl FreezeStateStore for DownStore {
    async fn find_active_with_modules(
        &self,
        _owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
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

fn guard_with(store: Arc<dyn FreezeStateStore>) -> FreezeGuard {
    FreezeGuard::new(Arc::new(FreezeStateCache::new(
        store,
        GuardConfig::default(),
    )))
}

fn frozen_store(owner_id: OwnerId, modules: &[ModuleTag]) -> Arc<FakeStore> {
    let store = FakeStore::default();
    store
        .active
        .lock()
        .unwrap()
        .insert(owner_id, modules.to_vec());
    Arc::new(store)
}

fn path(owner_id: OwnerId, rest: &str) -> String {
    format!("/api/users/{owner_id}/{rest}")
}

#[tokio::test]
async fn mutation_on_frozen_module_is_denied() {
    let owner = Uuid::new_v4();
    let guard = guard_with(frozen_store(owner, &[ModuleTag::Finance, ModuleTag::Home]));

    let decision = guard
        .evaluate(RequestVerb::Put, &path(owner, "accounts/5"), || Ok(owner))
        .await;
    let denial = match decision {
        GuardDecision::Deny(denial) => denial,
        other => panic!("expected denial, got {other:?}"),
    };
    assert_eq!(denial.module, ModuleTag::Finance);
    assert_eq!(denial.owner_id, owner);

    for verb in [RequestVerb::Post, RequestVerb::Patch, RequestVerb::Delete] {
        let decision = guard
            .evaluate(verb, &path(owner, "chores/1"), || Ok(owner))
            .await;
        assert!(!decision.is_allowed(), "{verb:?}");
    }
}

#[tokio::test]
async fn mutation_on_other_module_is_allowed() {
    let owner = Uuid::new_v4();
    let guard = guard_with(frozen_store(owner, &[ModuleTag::Finance, ModuleTag::Home]));

    let decision = guard
        .evaluate(RequestVerb::Post, &path(owner, "habits"), || Ok(owner))
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::NotFrozen));
}

#[tokio::test]
async fn read_only_verbs_skip_identity_and_store() {
    let owner = Uuid::new_v4();
    let store = frozen_store(owner, &[ModuleTag::Finance]);
    let guard = guard_with(store.clone());

    for verb in [RequestVerb::Get, RequestVerb::Head, RequestVerb::Options] {
        let decision = guard
            .evaluate(verb, &path(owner, "accounts"), || {
                panic!("identity must not be resolved for {verb:?}")
            })
            .await;
        assert_eq!(decision, GuardDecision::Allow(AllowReason::ReadOnlyVerb));
    }
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unmapped_path_is_allowed_without_store_read() {
    let owner = Uuid::new_v4();
    let store = frozen_store(owner, &ModuleTag::ALL);
    let guard = guard_with(store.clone());

    let decision = guard
        .evaluate(RequestVerb::Post, "/api/unknownthing", || Ok(owner))
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::UnmappedPath));
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identity_failure_is_left_to_authentication() {
    let owner = Uuid::new_v4();
    let store = frozen_store(owner, &[ModuleTag::Finance]);
    let guard = guard_with(store.clone());

    let missing = guard
        .evaluate(RequestVerb::Put, &path(owner, "accounts/5"), || {
            Err(AuthFailure::MissingCredentials)
        })
        .await;
    let invalid = guard
        .evaluate(RequestVerb::Put, &path(owner, "accounts/5"), || {
            Err(AuthFailure::InvalidCredentials("expired".to_string()))
        })
        .await;

    assert_eq!(missing, GuardDecision::Allow(AllowReason::Unidentified));
    assert_eq!(invalid, GuardDecision::Allow(AllowReason::Unidentified));
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_failure_fails_open() {
    let guard = guard_with(Arc::new(DownStore));
    let owner = Uuid::new_v4();

    let decision = guard
        .evaluate(RequestVerb::Delete, &path(owner, "transactions/9"), || {
            Ok(owner)
        })
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::FailOpen));
}

#[tokio::test(start_paused = true)]
async fn stalled_store_fails_open_after_timeout() {
    let guard = FreezeGuard::new(Arc::new(FreezeStateCache::new(
        Arc::new(StalledStore),
        GuardConfig {
            store_timeout: Duration::from_millis(250),
            ..GuardConfig::default()
        },
    )));
    let owner = Uuid::new_v4();
    let started = tokio::time::Instant::now();

    let decision = guard
        .evaluate(RequestVerb::Post, &path(owner, "workouts"), || Ok(owner))
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::FailOpen));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(250));
    assert!(waited < Duration::from_secs(1), "waited {waited:?}");
}

#[tokio::test]
async fn owner_without_active_period_is_allowed() {
    let guard = guard_with(Arc::new(FakeStore::default()));
    let owner = Uuid::new_v4();

    let decision = guard
        .evaluate(RequestVerb::Post, &path(owner, "workouts"), || Ok(owner))
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::NotFrozen));
}

#[tokio::test]
async fn freeze_state_is_scoped_to_the_acting_owner() {
    let frozen_owner = Uuid::new_v4();
    let other_owner = Uuid::new_v4();
    let guard = guard_with(frozen_store(frozen_owner, &[ModuleTag::Tasks]));

    let decision = guard
        .evaluate(RequestVerb::Post, "/api/tasks", || Ok(other_owner))
        .await;
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn sqlite_backed_guard_sees_writes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_shared_db(dir.path().join("lifepause.db")).unwrap();
    let guard = build_guard(
        Arc::new(SqliteFreezeStore::new(Arc::clone(&conn))),
        GuardConfig::default(),
    );
    let owner = Uuid::new_v4();
    let target = path(owner, "budgets/3");

    let before = guard.evaluate(RequestVerb::Put, &target, || Ok(owner)).await;
    assert_eq!(before, GuardDecision::Allow(AllowReason::NotFrozen));

    let period_id = {
        let locked = conn.lock().unwrap();
        let service = FreezeService::new(
            SqliteFreezePeriodRepository::try_new(&locked).unwrap(),
            guard.cache().clone(),
        );
        let period = service
            .schedule(ScheduleFreezeRequest {
                owner_id: owner,
                start_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
                reason: FreezeReason::MentalRest,
                custom_reason: None,
                modules: vec![ModuleTag::Finance],
            })
            .unwrap();
        service.activate(period.id).unwrap();
        period.id
    };

    let during = guard.evaluate(RequestVerb::Put, &target, || Ok(owner)).await;
    assert!(matches!(during, GuardDecision::Deny(ref denial) if denial.module == ModuleTag::Finance));

    {
        let locked = conn.lock().unwrap();
        let service = FreezeService::new(
            SqliteFreezePeriodRepository::try_new(&locked).unwrap(),
            guard.cache().clone(),
        );
        service.complete(period_id).unwrap();
    }

    let after = guard.evaluate(RequestVerb::Put, &target, || Ok(owner)).await;
    assert_eq!(after, GuardDecision::Allow(AllowReason::NotFrozen));
}
