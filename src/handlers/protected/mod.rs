// handlers/protected/mod.rs - Handlers behind the primary session
//
// Every handler takes `SessionUser` (token re-validated per request) and
// `UserScope` (the caller's backend access token, for row-level security).
// Single-record access goes through `guard::require_owner`.
pub mod dashboard;
pub mod preferences;
pub mod records;
pub mod session;
pub mod trips;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::backend::BackendAccess;
use crate::error::ApiError;
use crate::guard::Resource;
use crate::store::StoreScope;

/// Store scope carrying the backend access token left by the session bridge
pub struct UserScope(pub StoreScope);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserScope {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let access_token = parts
            .extensions
            .get::<BackendAccess>()
            .and_then(|access| access.0.clone());
        Ok(UserScope(StoreScope::User { access_token }))
    }
}

pub(crate) fn resource(name: &str) -> Result<Resource, ApiError> {
    Resource::by_name(name).ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", name)))
}
