use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::env;
use std::ops::RangeInclusive;
use thiserror::Error;
use url::Url;

use crate::routes::{PublicPath, PublicRoutes, RouteClass};

/// Errors raised while assembling configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub routes: RouteConfig,
    pub api: ApiConfig,
    pub store: StoreBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Rest,
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
    pub service_key: String,
    pub database_url: Option<String>,
    pub cookie_prefix: String,
    pub timeout_secs: u64,
    pub refresh_skew_secs: i64,
}

// Keys stay out of Debug output
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("cookie_prefix", &self.cookie_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub rotate_after_minutes: i64,
    pub secure_cookies: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("ttl_hours", &self.ttl_hours)
            .field("rotate_after_minutes", &self.rotate_after_minutes)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub login_path: String,
    pub public: PublicRoutes,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub public_app_url: Url,
    pub cors_origins: Vec<String>,
    pub enable_request_logging: bool,
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Required values fail fast.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let backend_url = parse_url("BACKEND_URL", &required("BACKEND_URL")?)?;
        let public_app_url = parse_url("PUBLIC_APP_URL", &required("PUBLIC_APP_URL")?)?;
        let database_url = get("DATABASE_URL");

        let store = match get("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres,
            Some("rest") => StoreBackend::Rest,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    reason: format!("unknown store backend '{}'", other),
                })
            }
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Rest,
        };
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let preset = Preset::for_environment(environment);

        let login_path = get("LOGIN_PATH").unwrap_or_else(|| "/anmelden".to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "LOGIN_PATH",
                reason: "must start with '/'".to_string(),
            });
        }

        let mut public = match get("PUBLIC_PATHS") {
            Some(list) => PublicRoutes::new(list.split(',').filter_map(PublicPath::parse).collect()),
            None => PublicRoutes::default(),
        };
        // The login page must never redirect to itself
        if public.classify(&login_path) == RouteClass::Protected {
            public = PublicRoutes::new(
                public
                    .entries()
                    .iter()
                    .cloned()
                    .chain([PublicPath::Exact(login_path.clone())])
                    .collect(),
            );
        }

        let cors_origins = match get("CORS_ORIGINS") {
            Some(v) => parse_origins(&v)?,
            None => vec![public_app_url.origin().ascii_serialization()],
        };

        let ttl_hours = in_range(
            "SESSION_TTL_HOURS",
            parse_or("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), preset.ttl_hours)?,
            1..=MAX_SESSION_TTL_HOURS,
        )?;
        let rotate_after_minutes = in_range(
            "SESSION_ROTATE_AFTER_MINUTES",
            parse_or(
                "SESSION_ROTATE_AFTER_MINUTES",
                get("SESSION_ROTATE_AFTER_MINUTES"),
                preset.rotate_after_minutes,
            )?,
            1..=ttl_hours * 60,
        )?;

        Ok(Self {
            environment,
            backend: BackendConfig {
                url: backend_url,
                anon_key: required("BACKEND_ANON_KEY")?,
                service_key: required("BACKEND_SERVICE_KEY")?,
                database_url,
                cookie_prefix: get("BACKEND_COOKIE_PREFIX").unwrap_or_else(|| "sb".to_string()),
                timeout_secs: parse_or("BACKEND_TIMEOUT_SECS", get("BACKEND_TIMEOUT_SECS"), 10)?,
                refresh_skew_secs: parse_or("BACKEND_REFRESH_SKEW_SECS", get("BACKEND_REFRESH_SKEW_SECS"), 60)?,
            },
            session: SessionConfig {
                secret: required("SESSION_SECRET")?,
                cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| "wk_session".to_string()),
                ttl_hours,
                rotate_after_minutes,
                secure_cookies: preset.secure_cookies,
            },
            routes: RouteConfig { login_path, public },
            api: ApiConfig {
                port: get("WAHLKREIS_API_PORT")
                    .or_else(|| get("PORT"))
                    .and_then(|s| s.parse::<u16>().ok())
                    .unwrap_or(3000),
                public_app_url,
                cors_origins,
                enable_request_logging: preset.request_logging,
            },
            store,
        })
    }

    /// Absolute URL of a path on the public application
    pub fn app_url(&self, path: &str) -> String {
        match self.api.public_app_url.join(path) {
            Ok(url) => url.to_string(),
            Err(_) => path.to_string(),
        }
    }
}

/// One year
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

struct Preset {
    ttl_hours: i64,
    rotate_after_minutes: i64,
    secure_cookies: bool,
    request_logging: bool,
}

impl Preset {
    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Preset {
                ttl_hours: 24 * 7,
                rotate_after_minutes: 60,
                secure_cookies: false,
                request_logging: true,
            },
            Environment::Staging => Preset {
                ttl_hours: 24,
                rotate_after_minutes: 30,
                secure_cookies: true,
                request_logging: true,
            },
            Environment::Production => Preset {
                ttl_hours: 12,
                rotate_after_minutes: 30,
                secure_cookies: true,
                request_logging: false,
            },
        }
    }
}

fn in_range(name: &'static str, value: i64, range: RangeInclusive<i64>) -> Result<i64, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            reason: format!("{} is outside {}..={}", value, range.start(), range.end()),
        })
    }
}

/// Explicit origins only. A wildcard cannot be combined with credentialed requests.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Err(ConfigError::Invalid {
                    name: "CORS_ORIGINS",
                    reason: "wildcard origin is not allowed with cookie credentials".to_string(),
                });
            }
            HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|e| ConfigError::Invalid {
                    name: "CORS_ORIGINS",
                    reason: format!("'{}': {}", origin, e),
                })
        })
        .collect()
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
        None => Ok(default),
    }
}
