use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{record_id, validate_identifier, value_text, Filter, Record, RecordStore, StoreError, StoreScope, ID_COLUMN};

/// In-process store used for local development and tests. Scope is ignored.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert records verbatim, generating ids where missing
    pub async fn seed(&self, table: &str, records: Vec<Record>) {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        for mut record in records {
            ensure_id(&mut record);
            rows.push(record);
        }
    }

    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }
}

fn ensure_id(record: &mut Record) {
    if record_id(record).is_none() {
        record.insert(ID_COLUMN.to_string(), Value::String(Uuid::new_v4().to_string()));
    }
}

fn matches(record: &Record, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        record
            .get(&filter.column)
            .map(|value| value_text(value) == value_text(&filter.value))
            .unwrap_or(false)
    })
}

fn has_id(record: &Record, id: &str) -> bool {
    record_id(record).as_deref() == Some(id)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, _scope: &StoreScope, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
        validate_identifier(table)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| has_id(r, id)).cloned()))
    }

    async fn list(&self, _scope: &StoreScope, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError> {
        validate_identifier(table)?;
        for filter in filters {
            validate_identifier(&filter.column)?;
        }
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, filters)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, _scope: &StoreScope, table: &str, mut record: Record) -> Result<Record, StoreError> {
        validate_identifier(table)?;
        for column in record.keys() {
            validate_identifier(column)?;
        }
        ensure_id(&mut record);

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(id) = record_id(&record) {
            if rows.iter().any(|r| has_id(r, &id)) {
                return Err(StoreError::InvalidRecord(format!("duplicate id {}", id)));
            }
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, _scope: &StoreScope, table: &str, id: &str, patch: Record) -> Result<Option<Record>, StoreError> {
        validate_identifier(table)?;
        for column in patch.keys() {
            validate_identifier(column)?;
        }

        let mut tables = self.tables.write().await;
        let Some(row) = tables.get_mut(table).and_then(|rows| rows.iter_mut().find(|r| has_id(r, id))) else {
            return Ok(None);
        };
        for (column, value) in patch {
            row.insert(column, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, _scope: &StoreScope, table: &str, id: &str) -> Result<bool, StoreError> {
        validate_identifier(table)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| !has_id(r, id));
        Ok(rows.len() < before)
    }
}
