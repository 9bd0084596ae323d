//! Table-scoped record access against the managed backend.
//!
//! Records are untyped JSON objects; the guard and handlers only rely on a few
//! well-known columns (`id`, the owner column, and per-table extras).

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod postgres;
pub mod rest;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

pub type Record = Map<String, Value>;

/// Primary key column shared by every table
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Credentials a store call runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScope {
    /// Privileged access for public routes and login
    Service,
    /// The caller's backend access token, when the backend session is alive
    User { access_token: Option<String> },
}

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { column: column.into(), value: value.into() }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch(&self, scope: &StoreScope, table: &str, id: &str) -> Result<Option<Record>, StoreError>;

    async fn list(&self, scope: &StoreScope, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError>;

    async fn insert(&self, scope: &StoreScope, table: &str, record: Record) -> Result<Record, StoreError>;

    /// Apply a partial update; `None` when no row has this id
    async fn update(&self, scope: &StoreScope, table: &str, id: &str, patch: Record) -> Result<Option<Record>, StoreError>;

    /// Returns whether a row was removed
    async fn delete(&self, scope: &StoreScope, table: &str, id: &str) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Table and column names are interpolated into URLs and SQL, so only plain
/// lowercase identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Text form of a JSON scalar as used in equality comparisons
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Text form of a record's `id`
pub fn record_id(record: &Record) -> Option<String> {
    record.get(ID_COLUMN).filter(|v| !v.is_null()).map(value_text)
}
