use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::BackendSession;

/// Lifetime of the refresh-token cookie
const REFRESH_COOKIE_DAYS: i64 = 30;

/// Names and attributes of the backend session cookie pair
#[derive(Debug, Clone)]
pub struct BackendCookies {
    prefix: String,
    secure: bool,
}

impl BackendCookies {
    pub fn new(prefix: impl Into<String>, secure: bool) -> Self {
        Self { prefix: prefix.into(), secure }
    }

    pub fn access_name(&self) -> String {
        format!("{}-access-token", self.prefix)
    }

    pub fn refresh_name(&self) -> String {
        format!("{}-refresh-token", self.prefix)
    }

    pub fn access_token(&self, jar: &CookieJar) -> Option<String> {
        non_empty(jar, &self.access_name())
    }

    pub fn refresh_token(&self, jar: &CookieJar) -> Option<String> {
        non_empty(jar, &self.refresh_name())
    }

    pub fn session_cookies(&self, session: &BackendSession) -> Vec<Cookie<'static>> {
        vec![
            self.build(self.access_name(), session.access_token.clone(), Duration::seconds(session.expires_in.max(0))),
            self.build(self.refresh_name(), session.refresh_token.clone(), Duration::days(REFRESH_COOKIE_DAYS)),
        ]
    }

    pub fn removal_cookies(&self) -> Vec<Cookie<'static>> {
        vec![
            self.build(self.access_name(), String::new(), Duration::ZERO),
            self.build(self.refresh_name(), String::new(), Duration::ZERO),
        ]
    }

    fn build(&self, name: String, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build()
    }
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
