//! Read-only freeze store contract consumed by the cache.

use crate::db::{lock_shared, SharedConnection};
use crate::model::freeze::OwnerId;
pub use crate::repo::freeze_repo::ActiveFreeze;
use crate::repo::freeze_repo::{FreezePeriodRepository, RepoError, SqliteFreezePeriodRepository};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Source of truth for "which period is active for this owner".
#[async_trait]
pub trait FreezeStateStore: Send + Sync {
    async fn find_active_with_modules(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError>;
}

/// Failures reading the freeze store.
#[derive(Debug)]
pub enum StoreError {
    Repo(RepoError),
    /// The store could not run the query at all.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "freeze store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// SQLite freeze store running its query on the blocking pool.
#[derive(Clone)]
pub struct SqliteFreezeStore {
    conn: SharedConnection,
}

impl SqliteFreezeStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FreezeStateStore for SqliteFreezeStore {
    async fn find_active_with_modules(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<ActiveFreeze>, StoreError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<Option<ActiveFreeze>, StoreError> {
            let conn = lock_shared(&conn);
            let repo = SqliteFreezePeriodRepository::try_new(&conn)?;
            Ok(repo.find_active_with_modules(owner_id)?)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("store task failed: {err}")))?
    }
}
