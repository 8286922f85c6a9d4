//! Owner identity extraction.
//!
//! The guard only needs "who is acting"; token verification belongs to the
//! gateway in front of this service, which forwards the verified owner id.

use axum::http::header::HeaderName;
use axum::http::request::Parts;
use lifepause_core::{AuthFailure, OwnerId};
use uuid::Uuid;

/// Header carrying the authenticated owner id.
pub const DEFAULT_OWNER_HEADER: &str = "x-owner-id";

/// Resolves the acting owner of a request.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, parts: &Parts) -> Result<OwnerId, AuthFailure>;
}

/// Reads the owner id from a trusted request header.
#[derive(Debug, Clone)]
pub struct OwnerHeaderIdentity {
    header: HeaderName,
}

impl OwnerHeaderIdentity {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for OwnerHeaderIdentity {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_OWNER_HEADER))
    }
}

impl IdentityProvider for OwnerHeaderIdentity {
    fn identify(&self, parts: &Parts) -> Result<OwnerId, AuthFailure> {
        let value = parts
            .headers
            .get(&self.header)
            .ok_or(AuthFailure::MissingCredentials)?;
        let raw = value.to_str().map_err(|_| {
            AuthFailure::InvalidCredentials(format!("{} is not visible ASCII", self.header))
        })?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthFailure::MissingCredentials);
        }
        Uuid::parse_str(raw).map_err(|_| {
            AuthFailure::InvalidCredentials(format!("{} is not a valid owner id", self.header))
        })
    }
}
