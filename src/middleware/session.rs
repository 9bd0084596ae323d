use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::redirect::{attach_cookies, redirect_to_login};
use crate::app::AppState;
use crate::auth::{issue_session_token, read_identity, session_cookie, Claims};
use crate::backend::BackendAccess;
use crate::routes::RouteClass;

/// Session bridge applied to every request.
///
/// The backend session is refreshed unconditionally and its cookies ride on
/// whichever response goes out. Only the primary session token decides
/// access: a protected path without one is redirected to the login page,
/// whatever state the backend cookies are in.
pub async fn session_bridge_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.config.as_ref();
    let path = request.uri().path().to_string();

    let identity = read_identity(request.headers(), &jar, &config.session);
    let refresh = state.refresher.refresh(&jar).await;
    let mut cookies = refresh.cookies;

    let class = config.routes.public.classify(&path);
    match (&identity, class) {
        (None, RouteClass::Protected) => {
            tracing::debug!("No valid session for protected path {}, redirecting to login", path);
            return redirect_to_login(config, cookies);
        }
        (Some(claims), _) if claims.due_for_rotation(config.session.rotate_after_minutes) => {
            if let Some(cookie) = rotate(claims, &state) {
                cookies.push(cookie);
            }
        }
        _ => {}
    }

    request.extensions_mut().insert(BackendAccess(refresh.access_token));
    if let Some(claims) = identity {
        request.extensions_mut().insert(claims);
    }

    let response = next.run(request).await;
    attach_cookies(response, cookies)
}

fn rotate(claims: &Claims, state: &AppState) -> Option<axum_extra::extract::cookie::Cookie<'static>> {
    let session = &state.config.session;
    let fresh = Claims::new(claims.profile(), session.ttl_hours);
    match issue_session_token(&fresh, session) {
        Ok(token) => {
            tracing::debug!("Rotated session token for subject {}", claims.sub);
            Some(session_cookie(token, session))
        }
        Err(e) => {
            tracing::error!("Failed to rotate session token: {}", e);
            None
        }
    }
}
