use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::{verify_session_token, Claims};
use crate::app::AppState;
use crate::config::SessionConfig;
use crate::error::ApiError;

/// Authenticated caller, re-derived from the primary session token
#[derive(Clone, Debug, Serialize)]
pub struct SessionUser {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub is_fraction_leadership: bool,
    pub wahlkreis: Option<String>,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            name: claims.name,
            email: claims.email,
            is_fraction_leadership: claims.is_fraction_leadership,
            wahlkreis: claims.wahlkreis,
        }
    }
}

/// Read the primary session from the session cookie, falling back to a bearer
/// header when the cookie is missing or does not verify. Malformed, forged or
/// expired tokens read as absent.
pub fn read_identity(headers: &HeaderMap, jar: &CookieJar, config: &SessionConfig) -> Option<Claims> {
    jar.get(&config.cookie_name)
        .and_then(|cookie| verify_session_token(cookie.value(), config))
        .or_else(|| bearer_token(headers).and_then(|token| verify_session_token(&token, config)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

// Handlers re-validate the token themselves instead of trusting the gate.
#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        read_identity(&parts.headers, &jar, &state.config.session)
            .map(SessionUser::from)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
