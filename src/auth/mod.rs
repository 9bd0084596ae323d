use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;

pub mod cookie;
pub mod identity;

pub use cookie::{clear_session_cookie, session_cookie};
pub use identity::{read_identity, SessionUser};

/// Primary session claims carried in the signed session cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user identifier; equals the owner column of every owned record
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_fraction_leadership: bool,
    #[serde(default)]
    pub wahlkreis: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Identity fields a session is issued for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub is_fraction_leadership: bool,
    pub wahlkreis: Option<String>,
}

impl Claims {
    pub fn new(profile: Profile, ttl_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: profile.sub,
            name: profile.name,
            email: profile.email,
            is_fraction_leadership: profile.is_fraction_leadership,
            wahlkreis: profile.wahlkreis,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            sub: self.sub.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            is_fraction_leadership: self.is_fraction_leadership,
            wahlkreis: self.wahlkreis.clone(),
        }
    }

    /// Whether the token is old enough to be reissued with a fresh expiry
    pub fn due_for_rotation(&self, rotate_after_minutes: i64) -> bool {
        Utc::now().timestamp() - self.iat >= rotate_after_minutes * 60
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

pub fn issue_session_token(claims: &Claims, config: &SessionConfig) -> Result<String, JwtError> {
    if config.secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify signature and expiry. Every failure is collapsed to `None`.
pub fn verify_session_token(token: &str, config: &SessionConfig) -> Option<Claims> {
    if config.secret.is_empty() || token.trim().is_empty() {
        return None;
    }

    let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            None
        }
    }
}
