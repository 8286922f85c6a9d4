//! Freeze period use-case service.
//!
//! # Responsibility
//! - Create freeze periods and drive their status state machine.
//! - Notify the guard cache after every write to an owner's periods.
//!
//! # Invariants
//! - Every successful write calls `FreezeInvalidation::invalidate` for the
//!   owner before returning.
//! - Terminal periods accept no further status or module changes.

use crate::guard::cache::FreezeInvalidation;
use crate::model::freeze::{
    FreezePeriod, FreezePeriodId, FreezeReason, FreezeStatus, FreezeValidationError, OwnerId,
};
use crate::model::module_tag::ModuleTag;
use crate::repo::freeze_repo::{FreezePeriodRepository, RepoError};
use chrono::{NaiveDate, Utc};
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Request model for scheduling a new freeze period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFreezeRequest {
    pub owner_id: OwnerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: FreezeReason,
    pub custom_reason: Option<String>,
    pub modules: Vec<ModuleTag>,
}

/// Errors from freeze service operations.
#[derive(Debug)]
pub enum FreezeServiceError {
    NotFound(FreezePeriodId),
    Validation(FreezeValidationError),
    Repo(RepoError),
}

impl Display for FreezeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "freeze period not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FreezeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<FreezeValidationError> for FreezeServiceError {
    fn from(value: FreezeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for FreezeServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

pub type FreezeServiceResult<T> = Result<T, FreezeServiceError>;

/// Use-case service writing freeze periods and keeping the guard fresh.
pub struct FreezeService<R: FreezePeriodRepository> {
    repo: R,
    invalidation: Arc<dyn FreezeInvalidation>,
}

impl<R: FreezePeriodRepository> FreezeService<R> {
    pub fn new(repo: R, invalidation: Arc<dyn FreezeInvalidation>) -> Self {
        Self { repo, invalidation }
    }

    /// Creates a `Scheduled` period.
    pub fn schedule(&self, request: ScheduleFreezeRequest) -> FreezeServiceResult<FreezePeriod> {
        let mut period = FreezePeriod::scheduled(
            request.owner_id,
            request.start_date,
            request.end_date,
            request.reason,
            request.modules,
        );
        period.custom_reason = request.custom_reason;
        self.repo.create_period(&period)?;
        self.after_write(&period, "schedule");
        Ok(period)
    }

    /// `Scheduled -> Active`.
    pub fn activate(&self, id: FreezePeriodId) -> FreezeServiceResult<FreezePeriod> {
        self.transition(id, FreezeStatus::Active, "activate")
    }

    /// `Active -> Completed`.
    pub fn complete(&self, id: FreezePeriodId) -> FreezeServiceResult<FreezePeriod> {
        self.transition(id, FreezeStatus::Completed, "complete")
    }

    /// `Scheduled | Active -> Cancelled`.
    pub fn cancel(&self, id: FreezePeriodId) -> FreezeServiceResult<FreezePeriod> {
        self.transition(id, FreezeStatus::Cancelled, "cancel")
    }

    /// Replaces the paused module set of a non-terminal period.
    pub fn replace_modules(
        &self,
        id: FreezePeriodId,
        modules: impl IntoIterator<Item = ModuleTag>,
    ) -> FreezeServiceResult<FreezePeriod> {
        let mut period = self.require(id)?;
        if period.status.is_terminal() {
            return Err(FreezeServiceError::Validation(
                FreezeValidationError::TerminalPeriod(period.status),
            ));
        }
        period.modules = modules.into_iter().collect::<BTreeSet<_>>();
        period.validate()?;
        self.repo.replace_modules(id, &period.modules)?;
        self.after_write(&period, "replace_modules");
        Ok(period)
    }

    /// Deletes a period and its module rows.
    pub fn delete(&self, id: FreezePeriodId) -> FreezeServiceResult<()> {
        let period = self.require(id)?;
        self.repo.delete_period(id)?;
        self.after_write(&period, "delete");
        Ok(())
    }

    pub fn get(&self, id: FreezePeriodId) -> FreezeServiceResult<Option<FreezePeriod>> {
        Ok(self.repo.get_period(id)?)
    }

    pub fn list_for_owner(&self, owner_id: OwnerId) -> FreezeServiceResult<Vec<FreezePeriod>> {
        Ok(self.repo.list_periods(owner_id, None)?)
    }

    fn transition(
        &self,
        id: FreezePeriodId,
        next: FreezeStatus,
        action: &'static str,
    ) -> FreezeServiceResult<FreezePeriod> {
        let mut period = self.require(id)?;
        period.transition_to(next, Utc::now().timestamp_millis())?;
        self.repo.update_status(&period)?;
        self.after_write(&period, action);
        Ok(period)
    }

    fn require(&self, id: FreezePeriodId) -> FreezeServiceResult<FreezePeriod> {
        self.repo
            .get_period(id)?
            .ok_or(FreezeServiceError::NotFound(id))
    }

    fn after_write(&self, period: &FreezePeriod, action: &'static str) {
        self.invalidation.invalidate(period.owner_id);
        info!(
            "event=freeze_period_write module=service status=ok action={} period_id={} owner_id={} freeze_status={:?}",
            action, period.id, period.owner_id, period.status
        );
    }
}
