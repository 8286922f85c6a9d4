use crate::cli::PeriodCommand;
use crate::error::{CliError, CliResult};
use axum::extract::Extension;
use axum::http::header::HeaderName;
use axum::http::{Method, Uri};
use axum::routing::any;
use lifepause_core::db::{open_db, open_shared_db};
use lifepause_core::{
    build_guard, FreezeInvalidation, FreezePeriod, FreezeService, FreezeStateCache, GuardConfig,
    OwnerId, ScheduleFreezeRequest, SqliteFreezePeriodRepository, SqliteFreezeStore,
};
use lifepause_http::{
    freeze_period_routes, with_freeze_guard, with_owner_auth, AuthenticatedOwner, GuardState,
    IdentityProvider, OwnerHeaderIdentity, PeriodState,
};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Writes from this process cannot reach a running server's cache; they take
/// effect there once its entry expires. Writes made through `serve`'s own
/// period endpoints invalidate immediately.
struct TtlExpiry;

impl FreezeInvalidation for TtlExpiry {
    fn invalidate(&self, owner_id: OwnerId) {
        debug!(
            "event=freeze_cache_invalidate module=cli status=deferred owner_id={owner_id} scope=ttl"
        );
    }
}

pub async fn frozen(db: &Path, owner_id: OwnerId, config: GuardConfig) -> CliResult<()> {
    let store = Arc::new(SqliteFreezeStore::new(open_shared_db(db)?));
    let cache = FreezeStateCache::new(store, config);

    let frozen = cache.get(owner_id).await?;
    if frozen.is_empty() {
        println!("owner={owner_id} frozen=none");
    } else {
        let tags: Vec<&str> = frozen.iter().map(|tag| tag.as_str()).collect();
        println!("owner={owner_id} frozen={}", tags.join(","));
    }
    Ok(())
}

pub fn period(command: PeriodCommand) -> CliResult<()> {
    match command {
        PeriodCommand::Schedule {
            db,
            owner,
            start,
            end,
            reason,
            custom_reason,
            modules,
        } => with_service(&db.path, |service| {
            service
                .schedule(ScheduleFreezeRequest {
                    owner_id: owner,
                    start_date: start,
                    end_date: end,
                    reason: reason.into(),
                    custom_reason,
                    modules,
                })
                .map(|period| print_period(&period))
                .map_err(CliError::from)
        }),
        PeriodCommand::Activate(target) => with_service(&target.db.path, |service| {
            print_period(&service.activate(target.id)?);
            Ok(())
        }),
        PeriodCommand::Complete(target) => with_service(&target.db.path, |service| {
            print_period(&service.complete(target.id)?);
            Ok(())
        }),
        PeriodCommand::Cancel(target) => with_service(&target.db.path, |service| {
            print_period(&service.cancel(target.id)?);
            Ok(())
        }),
        PeriodCommand::SetModules { target, modules } => {
            with_service(&target.db.path, |service| {
                print_period(&service.replace_modules(target.id, modules)?);
                Ok(())
            })
        }
        PeriodCommand::Delete(target) => with_service(&target.db.path, |service| {
            service.delete(target.id)?;
            println!("deleted id={}", target.id);
            Ok(())
        }),
        PeriodCommand::List { db, owner } => with_service(&db.path, |service| {
            for period in service.list_for_owner(owner)? {
                print_period(&period);
            }
            Ok(())
        }),
    }
}

fn with_service<T>(
    db: &Path,
    run: impl FnOnce(&FreezeService<SqliteFreezePeriodRepository<'_>>) -> CliResult<T>,
) -> CliResult<T> {
    let conn = open_db(db)?;
    let service = FreezeService::new(
        SqliteFreezePeriodRepository::try_new(&conn)?,
        Arc::new(TtlExpiry),
    );
    run(&service)
}

fn print_period(period: &FreezePeriod) {
    let modules: Vec<&str> = period.modules.iter().map(|tag| tag.as_str()).collect();
    println!(
        "id={} owner={} status={:?} start={} end={} reason={:?} modules={}",
        period.id,
        period.owner_id,
        period.status,
        period.start_date,
        period.end_date,
        period.reason,
        modules.join(",")
    );
}

pub async fn serve(
    db: &Path,
    addr: SocketAddr,
    owner_header: &str,
    config: GuardConfig,
) -> CliResult<()> {
    let header = HeaderName::from_bytes(owner_header.as_bytes()).map_err(|_| {
        CliError::InvalidArgument(format!("invalid owner header name `{owner_header}`"))
    })?;
    let conn = open_shared_db(db)?;
    let guard = build_guard(Arc::new(SqliteFreezeStore::new(Arc::clone(&conn))), config);
    let identity: Arc<dyn IdentityProvider> = Arc::new(OwnerHeaderIdentity::new(header));
    let periods = PeriodState::new(conn, guard.cache().clone());

    let router = freeze_period_routes(periods)
        .route("/", any(accept))
        .route("/*rest", any(accept));
    let app = with_freeze_guard(
        with_owner_auth(router, Arc::clone(&identity)),
        GuardState::new(guard, identity),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "event=server_start module=cli status=ok addr={} cache_ttl_secs={} store_timeout_ms={} cache_max_entries={}",
        listener.local_addr()?,
        config.cache_ttl.as_secs(),
        config.store_timeout.as_millis(),
        config.max_entries
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=cli status=ok");
    Ok(())
}

async fn accept(
    method: Method,
    uri: Uri,
    Extension(AuthenticatedOwner(owner_id)): Extension<AuthenticatedOwner>,
) -> String {
    format!("accepted {method} {} owner={owner_id}\n", uri.path())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=server_signal module=cli status=error error={err}");
    }
}
