//! Axum middleware for the module freeze guard.
//!
//! # Responsibility
//! - Run the guard before any handler, translating axum requests into
//!   verb + path + identity outcome.
//! - Provide the downstream authentication stage that owns identity errors.
//!
//! # Invariants
//! - The guard never rejects for identity reasons; requests it cannot
//!   attribute pass through to [`require_owner`] (or whatever auth layer the
//!   host installs).
//! - The guard layer wraps the auth layer so it runs first.

use crate::error::ServerError;
use crate::identity::IdentityProvider;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use lifepause_core::{FreezeGuard, GuardDecision, OwnerId, RequestVerb};
use log::debug;
use std::sync::Arc;

/// Shared state for [`module_freeze_guard`].
#[derive(Clone)]
pub struct GuardState {
    pub guard: FreezeGuard,
    pub identity: Arc<dyn IdentityProvider>,
}

impl GuardState {
    pub fn new(guard: FreezeGuard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { guard, identity }
    }
}

/// Owner attached to the request by [`require_owner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedOwner(pub OwnerId);

/// Maps an HTTP method onto the guard's verb set.
pub fn request_verb(method: &Method) -> RequestVerb {
    RequestVerb::from_method(method.as_str())
}

/// Middleware rejecting mutations against modules the owner has frozen.
pub async fn module_freeze_guard(
    State(state): State<GuardState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let verb = request_verb(request.method());
    let (parts, body) = request.into_parts();

    let decision = state
        .guard
        .evaluate(verb, parts.uri.path(), || state.identity.identify(&parts))
        .await;

    match decision {
        GuardDecision::Allow(_) => next.run(Request::from_parts(parts, body)).await,
        GuardDecision::Deny(denial) => ServerError::ModuleFrozen(denial).into_response(),
    }
}

/// Authentication stage: rejects requests without a usable owner identity.
pub async fn require_owner(
    State(identity): State<Arc<dyn IdentityProvider>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    match identity.identify(&parts) {
        Ok(owner_id) => {
            parts.extensions.insert(AuthenticatedOwner(owner_id));
            next.run(Request::from_parts(parts, body)).await
        }
        Err(failure) => {
            debug!(
                "event=owner_auth module=http status=rejected path={}",
                parts.uri.path()
            );
            ServerError::Unauthorized(failure).into_response()
        }
    }
}

/// Installs the freeze guard in front of every route of `router`.
pub fn with_freeze_guard<S>(router: Router<S>, state: GuardState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, module_freeze_guard))
}

/// Installs [`require_owner`] on every route of `router`.
pub fn with_owner_auth<S>(router: Router<S>, identity: Arc<dyn IdentityProvider>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(identity, require_owner))
}
