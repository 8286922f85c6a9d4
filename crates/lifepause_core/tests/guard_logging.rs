use async_trait::async_trait;
use lifepause_core::{
    ActiveFreeze, AllowReason, FreezeGuard, FreezeStateCache, FreezeStateStore, GuardConfig,
    GuardDecision, OwnerId, RequestVerb, StoreError,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Process-wide logger that keeps every record for inspection.
struct CapturingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE: CapturingLogger = CapturingLogger {
    records: Mutex::new(Vec::new()),
};

fn capture_logs() -> &'static CapturingLogger {
    // Only the first call installs; later calls reuse the same logger.
    if log::set_logger(&CAPTURE).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    &CAPTURE
}

fn records_mentioning(needle: &str) -> Vec<(Level, String)> {
    CAPTURE
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, message)| message.contains(needle))
        .cloned()
        .collect()
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

#[tokio::test]
async fn fail_open_is_logged_once_at_error_level() {
    capture_logs();
    let guard = FreezeGuard::new(Arc::new(FreezeStateCache::new(
        Arc::new(DownStore),
        GuardConfig::default(),
    )));
    let owner = Uuid::new_v4();

    let decision = guard
        .evaluate(
            RequestVerb::Patch,
            &format!("/api/users/{owner}/budgets/2"),
            || Ok(owner),
        )
        .await;
    assert_eq!(decision, GuardDecision::Allow(AllowReason::FailOpen));

    let errors: Vec<_> = records_mentioning(&owner.to_string())
        .into_iter()
        .filter(|(level, _)| *level == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    let message = &errors[0].1;
    assert!(message.contains("event=freeze_guard_check"), "{message}");
    assert!(message.contains("status=fail_open"), "{message}");
    assert!(message.contains("target_module=FINANCE"), "{message}");
    assert!(message.contains("database offline"), "{message}");
}

#[tokio::test]
async fn allowed_mutation_logs_no_error() {
    capture_logs();
    let guard = FreezeGuard::new(Arc::new(FreezeStateCache::new(
        Arc::new(DownStore),
        GuardConfig::default(),
    )));
    let owner = Uuid::new_v4();

    guard
        .evaluate(RequestVerb::Post, "/api/unknownthing", || Ok(owner))
        .await;
    assert!(records_mentioning(&owner.to_string()).is_empty());
}
