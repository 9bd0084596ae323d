use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::backend::{BackendAuthClient, SessionRefresher};
use crate::config::{AppConfig, StoreBackend};
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::session_bridge_middleware;
use crate::store::{MemoryStore, PgStore, RecordStore, RestStore};

/// Shared per-process dependencies handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub refresher: Arc<dyn SessionRefresher>,
    pub auth: Arc<BackendAuthClient>,
}

impl AppState {
    /// Wire up the backend clients and record store named by the config
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs))
            .build()?;

        let auth = Arc::new(BackendAuthClient::new(
            client.clone(),
            &config.backend,
            config.session.secure_cookies,
        ));

        let store: Arc<dyn RecordStore> = match config.store {
            StoreBackend::Rest => Arc::new(RestStore::new(client, &config.backend)),
            StoreBackend::Postgres => {
                let url = config
                    .backend
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store"))?;
                Arc::new(PgStore::connect(url, 10, config.backend.timeout_secs).await?)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory record store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            refresher: auth.clone(),
            auth,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), session_bridge_middleware))
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response));

    let router = if state.config.api.enable_request_logging {
        router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    } else {
        router
    };

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(public::pages::health))
        .route("/anmelden", get(public::pages::login_page))
        .route("/abmelden", get(public::auth::logout_redirect).post(public::auth::logout_redirect))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/logout", post(public::auth::logout))
        .route("/api/bpa-public/active-trips", get(public::bpa::active_trips))
        .route(
            "/api/bpa-public/form/:token",
            get(public::bpa::form_get).post(public::bpa::form_register),
        )
}

fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(protected::dashboard::dashboard))
        .route("/api/session", get(protected::session::whoami))
        // Specific routes before the generic resource routes
        .route("/api/trips/:id/form-link", post(protected::trips::form_link))
        .route("/api/trips/:id/recount", post(protected::trips::recount))
        .route("/api/preferences/dedupe", post(protected::preferences::dedupe))
        .route(
            "/api/:resource",
            get(protected::records::list).post(protected::records::create),
        )
        .route(
            "/api/:resource/:id",
            get(protected::records::get)
                .patch(protected::records::update)
                .delete(protected::records::delete),
        )
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);
    ApiError::internal_server_error("An error occurred while processing your request").into_response()
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
