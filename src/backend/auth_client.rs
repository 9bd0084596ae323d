use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BackendCookies, BackendError, BackendSession};
use crate::config::BackendConfig;

/// Result of the per-request backend session refresh
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    /// Cookies to attach to whatever response is returned
    pub cookies: Vec<Cookie<'static>>,
    /// Backend access token usable for the rest of this request
    pub access_token: Option<String>,
}

/// Keeps the backend's own session alive. Runs on every request and never
/// fails the request: problems are logged and yield an empty outcome.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, jar: &CookieJar) -> RefreshOutcome;
}

/// Client for the backend auth endpoints (`/auth/v1/*`)
pub struct BackendAuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
    cookies: BackendCookies,
    refresh_skew_secs: i64,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
}

impl BackendAuthClient {
    pub fn new(client: Client, config: &BackendConfig, secure_cookies: bool) -> Self {
        Self {
            client,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            cookies: BackendCookies::new(config.cookie_prefix.clone(), secure_cookies),
            refresh_skew_secs: config.refresh_skew_secs,
        }
    }

    pub fn cookies(&self) -> &BackendCookies {
        &self.cookies
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<BackendSession, BackendError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<BackendSession, BackendError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    /// Revoke the backend session server-side
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<BackendSession, BackendError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        Self::check(response)
            .await?
            .json::<BackendSession>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());
        Err(BackendError::Rejected { status: status.as_u16(), message })
    }
}

/// `exp` of a backend access token. Only the local refresh decision uses it;
/// the backend verifies the signature itself.
fn token_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.exp)
}

#[async_trait]
impl SessionRefresher for BackendAuthClient {
    async fn refresh(&self, jar: &CookieJar) -> RefreshOutcome {
        let access_token = self.cookies.access_token(jar);
        let refresh_token = self.cookies.refresh_token(jar);
        let now = Utc::now().timestamp();
        let expiry = access_token.as_deref().and_then(token_expiry);

        // Still valid beyond the skew window: nothing to refresh
        if expiry.is_some_and(|exp| exp - now > self.refresh_skew_secs) {
            return RefreshOutcome { cookies: Vec::new(), access_token };
        }
        let usable = access_token.filter(|_| expiry.is_some_and(|exp| exp > now));

        let Some(refresh_token) = refresh_token else {
            return RefreshOutcome { cookies: Vec::new(), access_token: usable };
        };

        match self.refresh_session(&refresh_token).await {
            Ok(session) => {
                tracing::debug!("Backend session refreshed");
                RefreshOutcome {
                    cookies: self.cookies.session_cookies(&session),
                    access_token: Some(session.access_token),
                }
            }
            Err(BackendError::Rejected { status, message }) if status == 400 || status == 401 => {
                tracing::info!("Backend refresh token rejected, clearing backend session: {}", message);
                RefreshOutcome { cookies: self.cookies.removal_cookies(), access_token: None }
            }
            Err(e) => {
                tracing::warn!("Backend session refresh failed: {}", e);
                RefreshOutcome { cookies: Vec::new(), access_token: usable }
            }
        }
    }
}
