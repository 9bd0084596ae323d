// handlers/protected/trips.rs - Owner actions on a trip
//
// POST /api/trips/:id/form-link   issue a new public registration link
// POST /api/trips/:id/recount     recompute registered_count from registrations

use axum::extract::{Path, State};
use serde_json::{json, Value};

use super::UserScope;
use crate::app::AppState;
use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::guard::require_owner;
use crate::guard::resource::{REGISTRATIONS, TRIPS};
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::{Filter, Record};
use crate::trips::{self, FORM_TOKEN_HASH_COLUMN, REGISTERED_COUNT_COLUMN, TRIP_ID_COLUMN};

/// Public form page the link points at
const FORM_PAGE: &str = "/bpa-formular/";

/// Replaces any previous link: only the hash of the newest token is kept.
pub async fn form_link(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    require_owner(state.store.as_ref(), TRIPS, &id, &user.sub).await?;

    let token = trips::generate_form_token();
    let mut patch = Record::new();
    patch.insert(FORM_TOKEN_HASH_COLUMN.to_string(), Value::String(trips::hash_form_token(&token)));
    state
        .store
        .update(&scope, TRIPS.table, &id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    let url = state.config.app_url(&format!("{}{}", FORM_PAGE, token));
    Ok(ApiResponse::created(json!({ "trip_id": id, "token": token, "url": url })))
}

pub async fn recount(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    require_owner(state.store.as_ref(), TRIPS, &id, &user.sub).await?;

    let registrations = state
        .store
        .list(
            &scope,
            REGISTRATIONS.table,
            &[Filter::eq(TRIP_ID_COLUMN, id.clone()), Filter::eq(REGISTRATIONS.owner_column, user.sub)],
        )
        .await?;
    let count = registrations.len() as i64;

    let mut patch = Record::new();
    patch.insert(REGISTERED_COUNT_COLUMN.to_string(), json!(count));
    let trip = state
        .store
        .update(&scope, TRIPS.table, &id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    Ok(ApiResponse::success(json!({
        "trip_id": id,
        "registered_count": count,
        "spots_left": trips::spots_left(&trip),
    })))
}
