//! Freeze period domain model.
//!
//! # Responsibility
//! - Define the owner-declared pause interval and its attached modules.
//! - Own the status state machine and its transition rules.
//!
//! # Invariants
//! - `end_date` is never earlier than `start_date`.
//! - `custom_reason` is present and non-blank iff `reason == FreezeReason::Other`.
//! - A period always carries at least one module tag.
//! - `Completed` and `Cancelled` are terminal.
//! - At most one `Active` period per owner is assumed by readers, not enforced here.

use crate::model::module_tag::ModuleTag;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one freeze period.
pub type FreezePeriodId = Uuid;

/// Stable identifier of the owner acting on the platform.
pub type OwnerId = Uuid;

/// Why the owner declared the pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreezeReason {
    Vacation,
    Travel,
    Illness,
    IntenseProject,
    MentalRest,
    /// Requires `custom_reason`.
    Other,
}

/// Lifecycle state of a freeze period.
///
/// Transitions: `Scheduled -> Active -> Completed`, plus
/// `Scheduled | Active -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreezeStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl FreezeStatus {
    /// Returns whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: FreezeStatus) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::Active, Self::Cancelled)
        )
    }
}

/// One owner-declared pause interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezePeriod {
    pub id: FreezePeriodId,
    pub owner_id: OwnerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: FreezeReason,
    /// Free text, meaningful only when `reason == FreezeReason::Other`.
    pub custom_reason: Option<String>,
    pub status: FreezeStatus,
    /// Unix epoch milliseconds of the `Scheduled -> Active` transition.
    pub activated_at: Option<i64>,
    /// Unix epoch milliseconds of leaving `Active` (or of cancelling).
    pub deactivated_at: Option<i64>,
    pub modules: BTreeSet<ModuleTag>,
}

impl FreezePeriod {
    /// Creates a `Scheduled` period with a generated id.
    ///
    /// Does not validate; call [`FreezePeriod::validate`] before persisting.
    pub fn scheduled(
        owner_id: OwnerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: FreezeReason,
        modules: impl IntoIterator<Item = ModuleTag>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            start_date,
            end_date,
            reason,
            custom_reason: None,
            status: FreezeStatus::Scheduled,
            activated_at: None,
            deactivated_at: None,
            modules: modules.into_iter().collect(),
        }
    }

    /// Validates field-level invariants.
    pub fn validate(&self) -> Result<(), FreezeValidationError> {
        if self.end_date < self.start_date {
            return Err(FreezeValidationError::EndBeforeStart {
                start_date: self.start_date,
                end_date: self.end_date,
            });
        }

        let has_custom_reason = self
            .custom_reason
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty());
        match (self.reason, has_custom_reason) {
            (FreezeReason::Other, false) => return Err(FreezeValidationError::MissingCustomReason),
            (FreezeReason::Other, true) => {}
            (_, _) if self.custom_reason.is_some() => {
                return Err(FreezeValidationError::UnexpectedCustomReason)
            }
            _ => {}
        }

        if self.modules.is_empty() {
            return Err(FreezeValidationError::NoModules);
        }

        Ok(())
    }

    /// Moves this period to `next`, stamping lifecycle timestamps.
    ///
    /// The period is left untouched when the transition is not allowed.
    pub fn transition_to(
        &mut self,
        next: FreezeStatus,
        now_epoch_ms: i64,
    ) -> Result<(), FreezeValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(FreezeValidationError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            FreezeStatus::Active => self.activated_at = Some(now_epoch_ms),
            FreezeStatus::Completed | FreezeStatus::Cancelled => {
                self.deactivated_at = Some(now_epoch_ms)
            }
            FreezeStatus::Scheduled => {}
        }
        self.status = next;
        Ok(())
    }

    /// Returns whether this period currently freezes its modules.
    pub fn is_active(&self) -> bool {
        self.status == FreezeStatus::Active
    }
}

/// Freeze period validation and transition errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeValidationError {
    EndBeforeStart {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    MissingCustomReason,
    UnexpectedCustomReason,
    NoModules,
    InvalidTransition {
        from: FreezeStatus,
        to: FreezeStatus,
    },
    /// Completed or cancelled periods are read-only.
    TerminalPeriod(FreezeStatus),
}

impl Display for FreezeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndBeforeStart {
                start_date,
                end_date,
            } => write!(
                f,
                "freeze end date {end_date} is earlier than start date {start_date}"
            ),
            Self::MissingCustomReason => {
                write!(f, "custom reason is required when reason is OTHER")
            }
            Self::UnexpectedCustomReason => {
                write!(f, "custom reason is only allowed when reason is OTHER")
            }
            Self::NoModules => write!(f, "freeze period must pause at least one module"),
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid freeze status transition {from:?} -> {to:?}")
            }
            Self::TerminalPeriod(status) => {
                write!(f, "freeze period is {status:?} and can no longer change")
            }
        }
    }
}

impl Error for FreezeValidationError {}
