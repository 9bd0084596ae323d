// handlers/protected/preferences.rs - POST /api/preferences/dedupe

use axum::extract::State;
use chrono::{DateTime, FixedOffset};
use futures::future::try_join_all;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::UserScope;
use crate::app::AppState;
use crate::auth::SessionUser;
use crate::guard::resource::PREFERENCES;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::{record_id, value_text, Filter, Record};

const KEY_COLUMN: &str = "key";
const UPDATED_AT_COLUMN: &str = "updated_at";

/// Keep the most recently updated preference row per key and delete the rest.
pub async fn dedupe(
    State(state): State<AppState>,
    user: SessionUser,
    UserScope(scope): UserScope,
) -> ApiResult<Value> {
    let rows = state
        .store
        .list(&scope, PREFERENCES.table, &[Filter::eq(PREFERENCES.owner_column, user.sub.clone())])
        .await?;

    let stale = duplicate_ids(&rows);
    try_join_all(
        stale
            .iter()
            .map(|id| state.store.delete(&scope, PREFERENCES.table, id)),
    )
    .await?;

    if !stale.is_empty() {
        tracing::info!("Removed {} duplicate preference rows for subject {}", stale.len(), user.sub);
    }
    Ok(ApiResponse::success(json!({
        "removed": stale.len(),
        "kept": rows.len() - stale.len(),
    })))
}

/// Ids of every row that is not the newest for its key. Rows without a key or
/// id are left alone.
fn duplicate_ids(rows: &[Record]) -> Vec<String> {
    let mut by_key: HashMap<String, Vec<&Record>> = HashMap::new();
    for row in rows {
        if let Some(key) = row.get(KEY_COLUMN).filter(|v| !v.is_null()) {
            by_key.entry(value_text(key)).or_default().push(row);
        }
    }

    let mut stale = Vec::new();
    for (_, mut group) in by_key {
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|row| std::cmp::Reverse(updated_at(row)));
        stale.extend(group.into_iter().skip(1).filter_map(record_id));
    }
    stale.sort();
    stale
}

fn updated_at(row: &Record) -> Option<DateTime<FixedOffset>> {
    row.get(UPDATED_AT_COLUMN)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}
