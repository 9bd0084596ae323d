use axum::{
    http::{
        header::{LOCATION, SET_COOKIE},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::collections::HashSet;

use crate::config::AppConfig;

/// 302 to the login page. The requested path is not carried along.
pub fn redirect_to_login(config: &AppConfig, cookies: Vec<Cookie<'static>>) -> Response {
    let location = config.app_url(&config.routes.login_path);
    let response = (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    attach_cookies(response, cookies)
}

/// Append cookies as `Set-Cookie` headers. A cookie the response already sets
/// under the same name is left alone, so handler decisions (e.g. logout) win.
pub fn attach_cookies(response: Response, cookies: Vec<Cookie<'static>>) -> Response {
    if cookies.is_empty() {
        return response;
    }

    let already_set: HashSet<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('=').map(|(name, _)| name.trim().to_string()))
        .collect();

    let jar = cookies
        .into_iter()
        .filter(|cookie| !already_set.contains(cookie.name()))
        .fold(CookieJar::new(), |jar, cookie| jar.add(cookie));

    (jar, response).into_response()
}
