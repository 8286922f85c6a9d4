//! Core domain logic for LifePause.
//! This crate owns freeze periods and the module freeze guard that enforces
//! them on incoming mutations.

pub mod config;
pub mod db;
pub mod guard;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

use std::sync::Arc;

pub use config::{ConfigError, GuardConfig};
pub use guard::cache::{
    Clock, FreezeCacheError, FreezeInvalidation, FreezeStateCache, FrozenModules, SystemClock,
};
pub use guard::route::resolve_module;
pub use guard::store::{ActiveFreeze, FreezeStateStore, SqliteFreezeStore, StoreError};
pub use guard::{
    AllowReason, AuthFailure, FreezeGuard, GuardDecision, ModuleFrozen, RequestVerb,
};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LogSettings, LoggingError,
};
pub use model::freeze::{
    FreezePeriod, FreezePeriodId, FreezeReason, FreezeStatus, FreezeValidationError, OwnerId,
};
pub use model::module_tag::{parse_module_tag, ModuleTag, ModuleTagError};
pub use repo::freeze_repo::{
    FreezePeriodRepository, RepoError, RepoResult, SqliteFreezePeriodRepository,
};
pub use service::freeze_service::{
    FreezeService, FreezeServiceError, FreezeServiceResult, ScheduleFreezeRequest,
};

/// Builds a guard over `store` using `config`.
pub fn build_guard(store: Arc<dyn FreezeStateStore>, config: GuardConfig) -> FreezeGuard {
    FreezeGuard::new(Arc::new(FreezeStateCache::new(store, config)))
}

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
