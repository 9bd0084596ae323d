// handlers/protected/dashboard.rs - GET /dashboard

use axum::extract::State;
use futures::future::try_join_all;
use serde_json::{json, Map, Value};

use super::UserScope;
use crate::app::AppState;
use crate::auth::SessionUser;
use crate::guard::resource;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::Filter;

/// Caller identity plus how many records they own per resource
pub async fn dashboard(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
) -> ApiResult<Value> {
    let counts = try_join_all(resource::ALL.into_iter().map(|resource| {
        let filters = [Filter::eq(resource.owner_column, user.sub.clone())];
        let store = state.store.clone();
        let scope = scope.clone();
        async move {
            let rows = store.list(&scope, resource.table, &filters).await?;
            Ok::<_, crate::store::StoreError>((resource.name, rows.len()))
        }
    }))
    .await?;

    let counts: Map<String, Value> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), json!(count)))
        .collect();

    Ok(ApiResponse::success(json!({ "user": user, "counts": counts })))
}
