//! Freeze period repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist freeze periods together with their module tags.
//! - Answer the request-path query "which modules are frozen for this owner".
//!
//! # Invariants
//! - Write paths call `FreezePeriod::validate()` before SQL mutations.
//! - A period row and its module rows are written in one transaction.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::freeze::{
    FreezePeriod, FreezePeriodId, FreezeReason, FreezeStatus, FreezeValidationError, OwnerId,
};
use crate::model::module_tag::{parse_module_tag, ModuleTag};
use chrono::NaiveDate;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PERIOD_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    start_date,
    end_date,
    reason,
    custom_reason,
    status,
    activated_at,
    deactivated_at
FROM freeze_periods";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for freeze-period persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(FreezeValidationError),
    Db(DbError),
    NotFound(FreezePeriodId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "freeze period not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted freeze data: {message}")
            }
            Self::MissingRequiredTable(table) => {
                write!(f, "freeze storage is missing table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<FreezeValidationError> for RepoError {
    fn from(value: FreezeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// The single active freeze of one owner, as seen by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFreeze {
    pub period_id: FreezePeriodId,
    pub modules: BTreeSet<ModuleTag>,
}

/// Repository interface for freeze periods.
pub trait FreezePeriodRepository {
    fn create_period(&self, period: &FreezePeriod) -> RepoResult<FreezePeriodId>;
    fn get_period(&self, id: FreezePeriodId) -> RepoResult<Option<FreezePeriod>>;
    /// Lists an owner's periods ordered by `start_date`, optionally by status.
    fn list_periods(
        &self,
        owner_id: OwnerId,
        status: Option<FreezeStatus>,
    ) -> RepoResult<Vec<FreezePeriod>>;
    /// Persists status and lifecycle timestamps of an already validated period.
    fn update_status(&self, period: &FreezePeriod) -> RepoResult<()>;
    /// Replaces the whole module set of one period.
    fn replace_modules(&self, id: FreezePeriodId, modules: &BTreeSet<ModuleTag>)
        -> RepoResult<()>;
    /// Deletes one period; its module rows cascade.
    fn delete_period(&self, id: FreezePeriodId) -> RepoResult<()>;
    /// Returns the owner's `ACTIVE` period and its modules, if any.
    fn find_active_with_modules(&self, owner_id: OwnerId) -> RepoResult<Option<ActiveFreeze>>;
}

/// SQLite-backed freeze period repository.
pub struct SqliteFreezePeriodRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFreezePeriodRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["freeze_periods", "freeze_period_modules"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn load_modules(&self, id: &str) -> RepoResult<BTreeSet<ModuleTag>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT module FROM freeze_period_modules WHERE freeze_period_id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut modules = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            let tag = parse_module_tag(&text).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid module `{text}` in freeze_period_modules.module"
                ))
            })?;
            modules.insert(tag);
        }
        Ok(modules)
    }
}

impl FreezePeriodRepository for SqliteFreezePeriodRepository<'_> {
    fn create_period(&self, period: &FreezePeriod) -> RepoResult<FreezePeriodId> {
        period.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO freeze_periods (
                id,
                owner_id,
                start_date,
                end_date,
                reason,
                custom_reason,
                status,
                activated_at,
                deactivated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                period.id.to_string(),
                period.owner_id.to_string(),
                period.start_date.format(DATE_FORMAT).to_string(),
                period.end_date.format(DATE_FORMAT).to_string(),
                reason_to_db(period.reason),
                period.custom_reason.as_deref(),
                status_to_db(period.status),
                period.activated_at,
                period.deactivated_at,
            ],
        )?;
        insert_modules(&tx, &period.id.to_string(), &period.modules)?;
        tx.commit()?;

        Ok(period.id)
    }

    fn get_period(&self, id: FreezePeriodId) -> RepoResult<Option<FreezePeriod>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERIOD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => {
                let mut period = parse_period_row(row)?;
                period.modules = self.load_modules(&period.id.to_string())?;
                Ok(Some(period))
            }
            None => Ok(None),
        }
    }

    fn list_periods(
        &self,
        owner_id: OwnerId,
        status: Option<FreezeStatus>,
    ) -> RepoResult<Vec<FreezePeriod>> {
        let mut sql = format!("{PERIOD_SELECT_SQL} WHERE owner_id = ?");
        let mut bind_values = vec![Value::Text(owner_id.to_string())];
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status_to_db(status).to_string()));
        }
        sql.push_str(" ORDER BY start_date ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut periods = Vec::new();
        while let Some(row) = rows.next()? {
            periods.push(parse_period_row(row)?);
        }
        for period in &mut periods {
            period.modules = self.load_modules(&period.id.to_string())?;
        }
        Ok(periods)
    }

    fn update_status(&self, period: &FreezePeriod) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE freeze_periods
             SET
                status = ?1,
                activated_at = ?2,
                deactivated_at = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?4;",
            params![
                status_to_db(period.status),
                period.activated_at,
                period.deactivated_at,
                period.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(period.id));
        }
        Ok(())
    }

    fn replace_modules(
        &self,
        id: FreezePeriodId,
        modules: &BTreeSet<ModuleTag>,
    ) -> RepoResult<()> {
        if modules.is_empty() {
            return Err(RepoError::Validation(FreezeValidationError::NoModules));
        }

        let id_text = id.to_string();
        let tx = self.conn.unchecked_transaction()?;
        let touched = tx.execute(
            "UPDATE freeze_periods
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id_text.as_str()],
        )?;
        if touched == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.execute(
            "DELETE FROM freeze_period_modules WHERE freeze_period_id = ?1;",
            [id_text.as_str()],
        )?;
        insert_modules(&tx, &id_text, modules)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_period(&self, id: FreezePeriodId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM freeze_periods WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn find_active_with_modules(&self, owner_id: OwnerId) -> RepoResult<Option<ActiveFreeze>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id
             FROM freeze_periods
             WHERE owner_id = ?1 AND status = 'ACTIVE'
             ORDER BY activated_at DESC, id ASC
             LIMIT 2;",
        )?;
        let ids = stmt
            .query_map([owner_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let Some(id_text) = ids.first() else {
            return Ok(None);
        };
        if ids.len() > 1 {
            // Single-active is an upstream assumption; report, don't resolve.
            warn!(
                "event=freeze_active_anomaly module=repo status=warn owner_id={owner_id} active_count_at_least=2"
            );
        }

        let period_id = parse_uuid(id_text, "freeze_periods.id")?;
        let modules = self.load_modules(id_text)?;
        Ok(Some(ActiveFreeze { period_id, modules }))
    }
}

fn insert_modules(
    conn: &Connection,
    period_id: &str,
    modules: &BTreeSet<ModuleTag>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO freeze_period_modules (freeze_period_id, module) VALUES (?1, ?2);",
    )?;
    for module in modules {
        stmt.execute(params![period_id, module.as_str()])?;
    }
    Ok(())
}

fn parse_period_row(row: &Row<'_>) -> RepoResult<FreezePeriod> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("owner_id")?;
    let reason_text: String = row.get("reason")?;
    let status_text: String = row.get("status")?;

    Ok(FreezePeriod {
        id: parse_uuid(&id_text, "freeze_periods.id")?,
        owner_id: parse_uuid(&owner_text, "freeze_periods.owner_id")?,
        start_date: parse_date(&row.get::<_, String>("start_date")?, "start_date")?,
        end_date: parse_date(&row.get::<_, String>("end_date")?, "end_date")?,
        reason: parse_reason(&reason_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid reason `{reason_text}` in freeze_periods.reason"
            ))
        })?,
        custom_reason: row.get("custom_reason")?,
        status: parse_status(&status_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid status `{status_text}` in freeze_periods.status"
            ))
        })?,
        activated_at: row.get("activated_at")?,
        deactivated_at: row.get("deactivated_at")?,
        modules: BTreeSet::new(),
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{value}` in freeze_periods.{column}"
        ))
    })
}

fn reason_to_db(reason: FreezeReason) -> &'static str {
    match reason {
        FreezeReason::Vacation => "VACATION",
        FreezeReason::Travel => "TRAVEL",
        FreezeReason::Illness => "ILLNESS",
        FreezeReason::IntenseProject => "INTENSE_PROJECT",
        FreezeReason::MentalRest => "MENTAL_REST",
        FreezeReason::Other => "OTHER",
    }
}

fn parse_reason(value: &str) -> Option<FreezeReason> {
    match value {
        "VACATION" => Some(FreezeReason::Vacation),
        "TRAVEL" => Some(FreezeReason::Travel),
        "ILLNESS" => Some(FreezeReason::Illness),
        "INTENSE_PROJECT" => Some(FreezeReason::IntenseProject),
        "MENTAL_REST" => Some(FreezeReason::MentalRest),
        "OTHER" => Some(FreezeReason::Other),
        _ => None,
    }
}

fn status_to_db(status: FreezeStatus) -> &'static str {
    match status {
        FreezeStatus::Scheduled => "SCHEDULED",
        FreezeStatus::Active => "ACTIVE",
        FreezeStatus::Completed => "COMPLETED",
        FreezeStatus::Cancelled => "CANCELLED",
    }
}

fn parse_status(value: &str) -> Option<FreezeStatus> {
    match value {
        "SCHEDULED" => Some(FreezeStatus::Scheduled),
        "ACTIVE" => Some(FreezeStatus::Active),
        "COMPLETED" => Some(FreezeStatus::Completed),
        "CANCELLED" => Some(FreezeStatus::Cancelled),
        _ => None,
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
