// handlers/public/bpa.rs - Public trip listing and token-gated registration forms
//
// GET  /api/bpa-public/active-trips?userId=U
// GET  /api/bpa-public/form/:token
// POST /api/bpa-public/form/:token

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::resource::{REGISTRATIONS, TRIPS};
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::{record_id, Filter, Record, StoreScope, ID_COLUMN};
use crate::trips::{self, ACTIVE_COLUMN, FORM_TOKEN_HASH_COLUMN, REGISTERED_COUNT_COLUMN, TRIP_ID_COLUMN};

#[derive(Debug, Deserialize)]
pub struct ActiveTripsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /api/bpa-public/active-trips - Active trips of one member, for embedding
pub async fn active_trips(
    State(state): State<AppState>,
    Query(query): Query<ActiveTripsQuery>,
) -> ApiResult<Vec<Record>> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("userId is required"))?;

    let rows = state
        .store
        .list(
            &StoreScope::Service,
            TRIPS.table,
            &[Filter::eq(TRIPS.owner_column, user_id), Filter::eq(ACTIVE_COLUMN, true)],
        )
        .await?;

    Ok(ApiResponse::success(
        rows.iter().map(|trip| trips::public_view(trip, TRIPS.owner_column)).collect(),
    ))
}

/// GET /api/bpa-public/form/:token - Trip behind a public form link
pub async fn form_get(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<Record> {
    let trip = trip_for_token(&state, &token).await?;
    Ok(ApiResponse::success(trips::public_view(&trip, TRIPS.owner_column)))
}

/// POST /api/bpa-public/form/:token - Register a participant for the trip
///
/// The registration is owned by the trip's owner so it shows up in their
/// registrations list. The capacity counter is read-then-written; concurrent
/// registrations are last-write-wins.
pub async fn form_register(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    let Value::Object(mut registration) = payload else {
        return Err(ApiError::bad_request("Registration must be a JSON object"));
    };

    let trip = trip_for_token(&state, &token).await?;
    if trips::is_full(&trip) {
        return Err(ApiError::conflict("Trip is fully booked"));
    }

    let trip_id = record_id(&trip).ok_or_else(|| ApiError::internal_server_error("Trip has no id"))?;
    let owner = trip
        .get(TRIPS.owner_column)
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("Trip has no owner"))?;

    registration.remove(ID_COLUMN);
    registration.insert(TRIP_ID_COLUMN.to_string(), Value::String(trip_id.clone()));
    registration.insert(REGISTRATIONS.owner_column.to_string(), owner);

    let scope = StoreScope::Service;
    let created = state.store.insert(&scope, REGISTRATIONS.table, registration).await?;

    let mut counter = Record::new();
    counter.insert(REGISTERED_COUNT_COLUMN.to_string(), json!(trips::registered_count(&trip) + 1));
    if state.store.update(&scope, TRIPS.table, &trip_id, counter).await?.is_none() {
        tracing::warn!("Trip {} vanished before its counter was updated", trip_id);
    }

    tracing::info!("Registration added to trip {}", trip_id);
    Ok(ApiResponse::created(json!({
        "id": record_id(&created),
        "trip_id": trip_id,
    })))
}

async fn trip_for_token(state: &AppState, token: &str) -> Result<Record, ApiError> {
    let hash = trips::hash_form_token(token);
    let rows = state
        .store
        .list(&StoreScope::Service, TRIPS.table, &[Filter::eq(FORM_TOKEN_HASH_COLUMN, hash)])
        .await?;

    rows.into_iter()
        .find(trips::is_active)
        .ok_or_else(|| ApiError::not_found("Form not found"))
}
