//! Module freeze guard.
//!
//! # Responsibility
//! - Decide, before any handler runs, whether a request mutates a module the
//!   acting owner has frozen.
//! - Stay framework-agnostic: HTTP adapters translate their request types into
//!   [`RequestVerb`] + path + identity outcome.
//!
//! # Invariants
//! - Non-mutating verbs are never inspected.
//! - Identity failures produce no guard action; the auth stage owns them.
//! - Store failures fail open (allow + error log), never reject.

pub mod cache;
pub mod route;
pub mod store;

use crate::guard::cache::FreezeStateCache;
use crate::guard::route::resolve_module;
use crate::model::freeze::OwnerId;
use crate::model::module_tag::ModuleTag;
use log::{error, info};
use std::sync::Arc;

/// Request verb as seen by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerb {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
    Other,
}

impl RequestVerb {
    /// Maps an HTTP method token (case-sensitive, per RFC 9110).
    pub fn from_method(method: &str) -> Self {
        match method {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            _ => Self::Other,
        }
    }

    /// Create, full update, partial update and delete.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

/// Identity provider outcome the guard treats as "no identity".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredentials,
    InvalidCredentials(String),
}

/// Why a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    ReadOnlyVerb,
    UnmappedPath,
    /// Left for the authentication stage to reject.
    Unidentified,
    NotFrozen,
    /// Freeze state could not be determined.
    FailOpen,
}

/// Domain rejection for a mutation against a frozen module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFrozen {
    pub owner_id: OwnerId,
    pub module: ModuleTag,
    pub message: String,
}

impl ModuleFrozen {
    pub fn new(owner_id: OwnerId, module: ModuleTag) -> Self {
        Self {
            owner_id,
            module,
            message: format!(
                "The {} module is paused during your freeze period; changes are disabled until it ends.",
                module.label()
            ),
        }
    }
}

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(AllowReason),
    Deny(ModuleFrozen),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Request-time freeze policy enforcement.
#[derive(Debug, Clone)]
pub struct FreezeGuard {
    cache: Arc<FreezeStateCache>,
}

impl FreezeGuard {
    pub fn new(cache: Arc<FreezeStateCache>) -> Self {
        Self { cache }
    }

    /// Cache handle, also the invalidation hook for freeze writers.
    pub fn cache(&self) -> &Arc<FreezeStateCache> {
        &self.cache
    }

    /// Evaluates one request.
    ///
    /// `identify` runs only for mutating requests on mapped paths.
    pub async fn evaluate<F>(&self, verb: RequestVerb, path: &str, identify: F) -> GuardDecision
    where
        F: FnOnce() -> Result<OwnerId, AuthFailure>,
    {
        if !verb.is_mutating() {
            return GuardDecision::Allow(AllowReason::ReadOnlyVerb);
        }
        let Some(module) = resolve_module(path) else {
            return GuardDecision::Allow(AllowReason::UnmappedPath);
        };
        let Ok(owner_id) = identify() else {
            return GuardDecision::Allow(AllowReason::Unidentified);
        };

        let frozen = match self.cache.get(owner_id).await {
            Ok(frozen) => frozen,
            Err(err) => {
                error!(
                    "event=freeze_guard_check module=guard status=fail_open owner_id={} target_module={} error={}",
                    owner_id, module, err
                );
                return GuardDecision::Allow(AllowReason::FailOpen);
            }
        };

        if frozen.contains(&module) {
            info!(
                "event=freeze_guard_denied module=guard status=denied owner_id={} target_module={} verb={:?}",
                owner_id, module, verb
            );
            return GuardDecision::Deny(ModuleFrozen::new(owner_id, module));
        }
        GuardDecision::Allow(AllowReason::NotFrozen)
    }
}
