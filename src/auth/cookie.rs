use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::SessionConfig;

pub fn session_cookie(token: String, config: &SessionConfig) -> Cookie<'static> {
    build(config, token, Duration::hours(config.ttl_hours))
}

pub fn clear_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    build(config, String::new(), Duration::ZERO)
}

fn build(config: &SessionConfig, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}
