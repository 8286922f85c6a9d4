//! HTTP adapter for the LifePause module freeze guard.
//!
//! Wraps an axum [`Router`](axum::Router) so that mutations against frozen
//! modules are rejected with `423 Locked` before any handler runs, and serves
//! the owner-facing freeze period endpoints.

pub mod error;
pub mod identity;
pub mod middleware;
pub mod periods;

pub use error::ServerError;
pub use identity::{IdentityProvider, OwnerHeaderIdentity, DEFAULT_OWNER_HEADER};
pub use middleware::{
    module_freeze_guard, request_verb, require_owner, with_freeze_guard, with_owner_auth,
    AuthenticatedOwner, GuardState,
};
pub use periods::{freeze_period_routes, PeriodState, ReplaceModulesRequest, SchedulePeriodRequest};
