use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

use super::{validate_identifier, value_text, Filter, Record, RecordStore, StoreError, StoreScope, ID_COLUMN};

/// Direct Postgres access to the backend database. Runs with the connection's
/// own role, so ownership rests entirely on the guard.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, timeout_secs: u64) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    fn decode(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Record>, StoreError> {
        rows.into_iter()
            .map(|row| match row.try_get::<Value, _>("row")? {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::Decode(format!("expected object row, got {}", other))),
            })
            .collect()
    }
}

fn quoted_columns(record: &Record) -> Result<String, StoreError> {
    if record.is_empty() {
        return Err(StoreError::InvalidRecord("no columns given".to_string()));
    }
    let mut columns = Vec::with_capacity(record.len());
    for column in record.keys() {
        validate_identifier(column)?;
        columns.push(format!("\"{}\"", column));
    }
    Ok(columns.join(", "))
}

fn select_sql(table: &str, filters: &[Filter]) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let mut sql = format!("SELECT row_to_json(t) AS row FROM (SELECT * FROM \"{}\"", table);
    for (i, filter) in filters.iter().enumerate() {
        validate_identifier(&filter.column)?;
        let keyword = if i == 0 { "WHERE" } else { "AND" };
        sql.push_str(&format!(" {} \"{}\"::text = ${}", keyword, filter.column, i + 1));
    }
    sql.push_str(") t");
    Ok(sql)
}

fn insert_sql(table: &str, record: &Record) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let columns = quoted_columns(record)?;
    Ok(format!(
        "INSERT INTO \"{table}\" AS r ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING row_to_json(r) AS row"
    ))
}

fn update_sql(table: &str, patch: &Record) -> Result<String, StoreError> {
    validate_identifier(table)?;
    let columns = quoted_columns(patch)?;
    Ok(format!(
        "UPDATE \"{table}\" AS r SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::\"{table}\", $1)) WHERE r.\"{ID_COLUMN}\"::text = $2 RETURNING row_to_json(r) AS row"
    ))
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch(&self, scope: &StoreScope, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let rows = self.list(scope, table, &[Filter::eq(ID_COLUMN, id)]).await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self, _scope: &StoreScope, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError> {
        let sql = select_sql(table, filters)?;
        let mut query = sqlx::query(&sql);
        for filter in filters {
            query = query.bind(value_text(&filter.value));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Self::decode(rows)
    }

    async fn insert(&self, _scope: &StoreScope, table: &str, record: Record) -> Result<Record, StoreError> {
        let sql = insert_sql(table, &record)?;
        let row = sqlx::query(&sql)
            .bind(Value::Object(record))
            .fetch_one(&self.pool)
            .await?;
        Self::decode(vec![row])?
            .pop()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, _scope: &StoreScope, table: &str, id: &str, patch: Record) -> Result<Option<Record>, StoreError> {
        let sql = update_sql(table, &patch)?;
        let row = sqlx::query(&sql)
            .bind(Value::Object(patch))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Self::decode(vec![row])?.pop()),
            None => Ok(None),
        }
    }

    async fn delete(&self, _scope: &StoreScope, table: &str, id: &str) -> Result<bool, StoreError> {
        validate_identifier(table)?;
        let sql = format!("DELETE FROM \"{}\" WHERE \"{}\"::text = $1", table, ID_COLUMN);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
