// handlers/public/auth.rs - POST /api/auth/login, POST /api/auth/logout, GET|POST /abmelden

use axum::{extract::State, response::Response, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{clear_session_cookie, issue_session_token, session_cookie, Claims, Profile, SessionUser};
use crate::error::ApiError;
use crate::middleware::{redirect_to_login, ApiResponse};
use crate::store::{Record, StoreScope};

const PROFILES_TABLE: &str = "profiles";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login - Sign in against the backend and open both sessions
///
/// Sets the primary session cookie and the backend session cookie pair.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<SessionUser>), ApiError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let session = state.auth.sign_in_with_password(email, &payload.password).await?;
    let user_id = session
        .user
        .as_ref()
        .map(|user| user.id.clone())
        .ok_or_else(|| {
            tracing::error!("Backend sign-in response carried no user");
            ApiError::internal_server_error("An error occurred while processing your request")
        })?;

    let profile = load_profile(&state, &user_id, email).await?;
    let claims = Claims::new(profile, state.config.session.ttl_hours);
    let token = issue_session_token(&claims, &state.config.session)?;

    let jar = state
        .auth
        .cookies()
        .session_cookies(&session)
        .into_iter()
        .fold(CookieJar::new().add(session_cookie(token, &state.config.session)), |jar, cookie| {
            jar.add(cookie)
        });

    tracing::info!("Login succeeded for subject {}", claims.sub);
    Ok((jar, ApiResponse::success(SessionUser::from(claims))))
}

/// POST /api/auth/logout - Clear both sessions
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<Value>) {
    let cookies = end_session(&state, &jar).await;
    let out = cookies.into_iter().fold(CookieJar::new(), |jar, cookie| jar.add(cookie));
    (out, ApiResponse::success(json!({ "logged_out": true })))
}

/// GET|POST /abmelden - Clear both sessions and go back to the login page
pub async fn logout_redirect(State(state): State<AppState>, jar: CookieJar) -> Response {
    let cookies = end_session(&state, &jar).await;
    redirect_to_login(&state.config, cookies)
}

async fn end_session(state: &AppState, jar: &CookieJar) -> Vec<Cookie<'static>> {
    if let Some(access_token) = state.auth.cookies().access_token(jar) {
        if let Err(e) = state.auth.sign_out(&access_token).await {
            tracing::warn!("Backend sign-out failed, clearing cookies anyway: {}", e);
        }
    }

    let mut cookies = vec![clear_session_cookie(&state.config.session)];
    cookies.extend(state.auth.cookies().removal_cookies());
    cookies
}

async fn load_profile(state: &AppState, user_id: &str, email: &str) -> Result<Profile, ApiError> {
    let record = state
        .store
        .fetch(&StoreScope::Service, PROFILES_TABLE, user_id)
        .await?
        .unwrap_or_default();

    if record.is_empty() {
        tracing::warn!("No profile row for subject {}, using defaults", user_id);
    }

    Ok(profile_from_record(user_id, email, &record))
}

fn profile_from_record(user_id: &str, email: &str, record: &Record) -> Profile {
    let text = |column: &str| record.get(column).and_then(|v| v.as_str()).map(str::to_string);

    Profile {
        sub: user_id.to_string(),
        name: text("name").unwrap_or_else(|| email.to_string()),
        email: text("email").unwrap_or_else(|| email.to_string()),
        is_fraction_leadership: record
            .get("is_fraction_leadership")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        wahlkreis: text("wahlkreis"),
    }
}
