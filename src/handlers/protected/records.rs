// handlers/protected/records.rs - Owner-scoped record routes
//
// GET    /api/:resource       list the caller's records
// POST   /api/:resource       create a record owned by the caller
// GET    /api/:resource/:id   read one record (guarded)
// PATCH  /api/:resource/:id   update one record (guarded)
// DELETE /api/:resource/:id   delete one record (guarded)

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::{resource, UserScope};
use crate::app::AppState;
use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::guard::{require_owner, Resource};
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::{Filter, Record, ID_COLUMN};

pub async fn list(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path(name): Path<String>,
) -> ApiResult<Vec<Record>> {
    let resource = resource(&name)?;
    let rows = state
        .store
        .list(&scope, resource.table, &[Filter::eq(resource.owner_column, user.sub)])
        .await?;
    Ok(ApiResponse::success(rows))
}

pub async fn create(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Record> {
    let resource = resource(&name)?;
    let mut record = writable_fields(resource, payload)?;
    record.insert(resource.owner_column.to_string(), Value::String(user.sub.clone()));

    let created = state.store.insert(&scope, resource.table, record).await?;
    tracing::debug!("Created {} record for subject {}", resource.name, user.sub);
    Ok(ApiResponse::created(created))
}

pub async fn get(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<Record> {
    let resource = resource(&name)?;
    let record = require_owner(state.store.as_ref(), resource, &id, &user.sub).await?;
    Ok(ApiResponse::success(record))
}

pub async fn update(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path((name, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> ApiResult<Record> {
    let resource = resource(&name)?;
    require_owner(state.store.as_ref(), resource, &id, &user.sub).await?;

    let patch = writable_fields(resource, payload)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("No updatable fields given"));
    }

    // Deleted between the guard and the write
    let updated = state
        .store
        .update(&scope, resource.table, &id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;
    Ok(ApiResponse::success(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let resource = resource(&name)?;
    require_owner(state.store.as_ref(), resource, &id, &user.sub).await?;

    if !state.store.delete(&scope, resource.table, &id).await? {
        return Err(ApiError::not_found("Not found"));
    }
    tracing::info!("Deleted {} {} for subject {}", resource.name, id, user.sub);
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// Client-supplied columns minus the primary key and owner column, with the
/// resource's touch column stamped.
fn writable_fields(resource: Resource, payload: Value) -> Result<Record, ApiError> {
    let Value::Object(mut record) = payload else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };

    record.remove(ID_COLUMN);
    record.remove(resource.owner_column);
    if let Some(column) = resource.touch_column {
        record.remove(column);
        if !record.is_empty() {
            record.insert(column.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::resource::{PREFERENCES, TRIPS};

    #[test]
    fn test_owner_and_id_are_not_writable() {
        let record = writable_fields(TRIPS, json!({"id": "x", "user_id": "B", "title": "Berlin"})).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record["title"], json!("Berlin"));
    }

    #[test]
    fn test_touch_column_is_stamped() {
        let record = writable_fields(PREFERENCES, json!({"key": "newsletter", "updated_at": "1999"})).unwrap();
        assert_ne!(record["updated_at"], json!("1999"));
    }

    #[test]
    fn test_empty_patch_stays_empty() {
        assert!(writable_fields(PREFERENCES, json!({"user_id": "B"})).unwrap().is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(writable_fields(TRIPS, json!([1, 2])), Err(ApiError::BadRequest(_))));
    }
}
