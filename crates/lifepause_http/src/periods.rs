//! Freeze period endpoints for the authenticated owner.
//!
//! # Endpoints
//! - `GET /api/freeze-periods`: list the owner's periods
//! - `POST /api/freeze-periods`: schedule a period (201)
//! - `GET /api/freeze-periods/:id`: fetch one period
//! - `DELETE /api/freeze-periods/:id`: delete a period and its modules (204)
//! - `POST /api/freeze-periods/:id/{activate,complete,cancel}`: status moves
//! - `PUT /api/freeze-periods/:id/modules`: replace the module set
//!
//! # Invariants
//! - Every write goes through [`FreezeService`], which invalidates the
//!   owner's guard cache entry on success.
//! - `freeze-periods` is not in the module route table, so the guard never
//!   blocks these endpoints; lifting a freeze must stay possible.
//! - Another owner's period answers 404, never 403.

use crate::error::ServerError;
use crate::middleware::AuthenticatedOwner;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use lifepause_core::db::{lock_shared, SharedConnection};
use lifepause_core::{
    FreezeInvalidation, FreezePeriod, FreezePeriodId, FreezeReason, FreezeService,
    FreezeServiceError, FreezeServiceResult, ModuleTag, OwnerId, ScheduleFreezeRequest,
    SqliteFreezePeriodRepository,
};
use serde::Deserialize;
use std::sync::Arc;

/// Shared state for the period endpoints.
#[derive(Clone)]
pub struct PeriodState {
    conn: SharedConnection,
    invalidation: Arc<dyn FreezeInvalidation>,
}

impl PeriodState {
    /// `invalidation` should be the serving guard's cache so writes are
    /// enforced on the very next request.
    pub fn new(conn: SharedConnection, invalidation: Arc<dyn FreezeInvalidation>) -> Self {
        Self { conn, invalidation }
    }
}

/// Request body for `POST /api/freeze-periods`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePeriodRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: FreezeReason,
    #[serde(default)]
    pub custom_reason: Option<String>,
    pub modules: Vec<ModuleTag>,
}

/// Request body for `PUT /api/freeze-periods/:id/modules`.
#[derive(Debug, Deserialize)]
pub struct ReplaceModulesRequest {
    pub modules: Vec<ModuleTag>,
}

/// Routes for managing the caller's freeze periods.
///
/// Expects [`AuthenticatedOwner`] in request extensions, so mount it inside
/// [`with_owner_auth`](crate::with_owner_auth).
pub fn freeze_period_routes(state: PeriodState) -> Router {
    Router::new()
        .route(
            "/api/freeze-periods",
            get(list_periods).post(schedule_period),
        )
        .route(
            "/api/freeze-periods/:id",
            get(get_period).delete(delete_period),
        )
        .route("/api/freeze-periods/:id/activate", post(activate_period))
        .route("/api/freeze-periods/:id/complete", post(complete_period))
        .route("/api/freeze-periods/:id/cancel", post(cancel_period))
        .route("/api/freeze-periods/:id/modules", put(replace_modules))
        .with_state(state)
}

async fn list_periods(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
) -> Result<Json<Vec<FreezePeriod>>, ServerError> {
    let periods = with_service(&state, move |service| service.list_for_owner(owner_id)).await?;
    Ok(Json(periods))
}

async fn schedule_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Json(body): Json<SchedulePeriodRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let period = with_service(&state, move |service| {
        service.schedule(ScheduleFreezeRequest {
            owner_id,
            start_date: body.start_date,
            end_date: body.end_date,
            reason: body.reason,
            custom_reason: body.custom_reason,
            modules: body.modules,
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(period)))
}

async fn get_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
) -> Result<Json<FreezePeriod>, ServerError> {
    let period = with_service(&state, move |service| owned_period(service, id, owner_id)).await?;
    Ok(Json(period))
}

async fn delete_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
) -> Result<StatusCode, ServerError> {
    with_service(&state, move |service| {
        owned_period(service, id, owner_id)?;
        service.delete(id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
) -> Result<Json<FreezePeriod>, ServerError> {
    let period = with_service(&state, move |service| {
        owned_period(service, id, owner_id)?;
        service.activate(id)
    })
    .await?;
    Ok(Json(period))
}

async fn complete_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
) -> Result<Json<FreezePeriod>, ServerError> {
    let period = with_service(&state, move |service| {
        owned_period(service, id, owner_id)?;
        service.complete(id)
    })
    .await?;
    Ok(Json(period))
}

async fn cancel_period(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
) -> Result<Json<FreezePeriod>, ServerError> {
    let period = with_service(&state, move |service| {
        owned_period(service, id, owner_id)?;
        service.cancel(id)
    })
    .await?;
    Ok(Json(period))
}

async fn replace_modules(
    State(state): State<PeriodState>,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
    Path(id): Path<FreezePeriodId>,
    Json(body): Json<ReplaceModulesRequest>,
) -> Result<Json<FreezePeriod>, ServerError> {
    let period = with_service(&state, move |service| {
        owned_period(service, id, owner_id)?;
        service.replace_modules(id, body.modules)
    })
    .await?;
    Ok(Json(period))
}

fn owned_period(
    service: &FreezeService<SqliteFreezePeriodRepository<'_>>,
    id: FreezePeriodId,
    owner_id: OwnerId,
) -> FreezeServiceResult<FreezePeriod> {
    service
        .get(id)?
        .filter(|period| period.owner_id == owner_id)
        .ok_or(FreezeServiceError::NotFound(id))
}

/// Runs `run` against a service over the shared connection on the blocking
/// pool.
async fn with_service<T, F>(state: &PeriodState, run: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce(&FreezeService<SqliteFreezePeriodRepository<'_>>) -> FreezeServiceResult<T>
        + Send
        + 'static,
{
    let conn = Arc::clone(&state.conn);
    let invalidation = Arc::clone(&state.invalidation);
    tokio::task::spawn_blocking(move || -> Result<T, ServerError> {
        let conn = lock_shared(&conn);
        let repo = SqliteFreezePeriodRepository::try_new(&conn).map_err(FreezeServiceError::from)?;
        let service = FreezeService::new(repo, invalidation);
        Ok(run(&service)?)
    })
    .await
    .map_err(|err| ServerError::Internal(format!("freeze period task failed: {err}")))?
}
